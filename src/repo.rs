use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

const CONFIG_FILE: &str = "config.toml";

/// directories created by `init`
const LAYOUT: &[&str] = &[
    "objects/blobs",
    "objects/trees",
    "objects/commits",
    "refs/heads",
    "deltas",
    "delta-indexes",
    "summaries",
    "tmp",
];

/// a flatpak-style repository: object store, refs and published summaries
pub struct Repo {
    path: PathBuf,
    config: Config,
}

impl Repo {
    pub fn init(path: &Path) -> Result<Self> {
        Self::init_with_config(path, Config::default())
    }

    /// create the on-disk layout and write `config`
    pub fn init_with_config(path: &Path, config: Config) -> Result<Self> {
        let config_path = path.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        for dir in LAYOUT {
            let dir = path.join(dir);
            std::fs::create_dir_all(&dir).with_path(dir)?;
        }
        config.save(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            config: Config::load(&config_path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// write the in-memory configuration back to `config.toml`
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.path.join(CONFIG_FILE))
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("objects/blobs")
    }

    pub fn trees_path(&self) -> PathBuf {
        self.path.join("objects/trees")
    }

    pub fn commits_path(&self) -> PathBuf {
        self.path.join("objects/commits")
    }

    /// local refs; remotes and mirrors are never stored here
    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs/heads")
    }

    /// static deltas, one directory per `[FROM-]TO` name
    pub fn deltas_path(&self) -> PathBuf {
        self.path.join("deltas")
    }

    pub fn delta_indexes_path(&self) -> PathBuf {
        self.path.join("delta-indexes")
    }

    /// digested partition summaries, summary deltas and index signatures
    pub fn summaries_path(&self) -> PathBuf {
        self.path.join("summaries")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.path.join("summary")
    }

    pub fn summary_sig_path(&self) -> PathBuf {
        self.path.join("summary.sig")
    }

    pub fn index_path(&self) -> PathBuf {
        self.path.join("summary.idx")
    }

    pub fn index_sig_path(&self) -> PathBuf {
        self.path.join("summary.idx.sig")
    }

    /// scratch space for atomic writes, on the same filesystem as everything else
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// take the exclusive repository lock without waiting
    ///
    /// the lock is released when the returned guard is dropped.
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.path.join(".lock");
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention)?;

        Ok(RepoLock { _flock: flock })
    }
}

/// holds the repository lock until dropped
pub struct RepoLock {
    _flock: Flock<File>,
}
