use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// point a ref at a commit, creating it if needed
///
/// names are slash separated, e.g. `app/org.foo.Bar/x86_64/stable`, and map
/// to nested files under `refs/heads`.
pub fn write_ref(repo: &Repo, name: &str, hash: &Hash) -> Result<()> {
    validate_ref_name(name)?;

    let path = ref_path(repo, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    crate::fs::write_atomic(&repo.tmp_path(), &path, format!("{}\n", hash).as_bytes())
}

/// commit a ref points at
pub fn read_ref(repo: &Repo, name: &str) -> Result<Hash> {
    let path = ref_path(repo, name);
    let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::RefNotFound(name.to_string()),
        _ => Error::Io { path, source: e },
    })?;

    Hash::from_hex(content.trim())
}

/// local ref names, sorted
///
/// only `refs/heads` is scanned, so remote and mirrored refs never show up.
pub fn list_refs(repo: &Repo) -> Result<Vec<String>> {
    let heads = repo.refs_path();
    let mut names = Vec::new();

    for entry in WalkDir::new(&heads).min_depth(1) {
        let entry = entry.map_err(|e| Error::Io {
            path: e.path().map(|p| p.to_path_buf()).unwrap_or_else(|| heads.clone()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(&heads) {
            names.push(rel.to_string_lossy().into_owned());
        }
    }

    names.sort();
    Ok(names)
}

/// every local ref with the commit it points at
pub fn list_ref_commits(repo: &Repo) -> Result<BTreeMap<String, Hash>> {
    list_refs(repo)?
        .into_iter()
        .map(|name| {
            let hash = read_ref(repo, &name)?;
            Ok((name, hash))
        })
        .collect()
}

fn ref_path(repo: &Repo, name: &str) -> PathBuf {
    repo.refs_path().join(name)
}

fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::InvalidRef(format!("{}: {:?}", why, name)));

    if name.is_empty() {
        return invalid("empty ref name");
    }
    if name.contains('\0') {
        return invalid("null byte in ref name");
    }
    for component in name.split('/') {
        match component {
            "" => return invalid("empty component in ref name"),
            "." | ".." => return invalid("relative component in ref name"),
            _ => {}
        }
    }

    Ok(())
}
