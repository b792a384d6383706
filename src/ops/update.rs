use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::iter;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::deltas::{list_static_delta_names, load_static_deltas, reindex_static_deltas};
use crate::error::{Error, Result};
use crate::fs::{file_mtime, set_mtime, write_atomic};
use crate::hash::Hash;
use crate::refs::list_ref_commits;
use crate::repo::Repo;
use crate::sign::{DetachedSignatures, Signer};
use crate::summary::{
    build_index, partition_name, repo_metadata, CommitDataCache, DigestedSummaryStore, GcStats,
    SummaryGenerator, SummaryIndex,
};
use crate::types::refname::{is_payload_ref, partition_arches, ref_arch};

/// options for an update pass
#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// only write the compat summary; any existing index is removed
    pub disable_index: bool,
    /// overrides `summary-history-length`; zero disables summary deltas
    pub history_length: Option<u32>,
}

/// what an update pass published
#[derive(Clone, Debug, Default)]
pub struct UpdateReport {
    /// number of refs in the compat summary
    pub refs: usize,
    /// partition name -> summary digest
    pub summaries: BTreeMap<String, Hash>,
    pub index_digest: Option<Hash>,
    pub gc: GcStats,
}

/// regenerate the compat summary, the partition summaries and the index
///
/// everything that can fail is computed before the first published file is
/// replaced. files are replaced atomically in the order index signature,
/// index, summary, summary signature. unreferenced summaries and deltas are
/// then garbage collected.
pub fn update_repo(
    repo: &Repo,
    options: &UpdateOptions,
    signer: Option<&dyn Signer>,
) -> Result<UpdateReport> {
    let _lock = repo.lock()?;
    let config = repo.config();

    let refs = list_ref_commits(repo)?;
    tracing::info!("updating summary for {} refs", refs.len());

    let old_index = SummaryIndex::load(repo)?;
    let mut store = DigestedSummaryStore::new(repo);
    let mut cache = match &old_index {
        Some((index, _)) => CommitDataCache::populate_from_index(index, &mut store),
        None => CommitDataCache::new(),
    };

    let delta_names = list_static_delta_names(repo)?;
    let static_deltas = load_static_deltas(repo, &delta_names)?;

    let mut arches = BTreeSet::new();
    let mut subsets = BTreeSet::new();
    for (name, checksum) in &refs {
        if let Some(arch) = ref_arch(name) {
            arches.insert(arch.to_string());
        }
        if is_payload_ref(name) {
            let data = cache.ensure(repo, checksum)?;
            if let Some(names) = &data.subsets {
                subsets.extend(names.iter().cloned());
            }
        }
    }

    let last_modified = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let metadata = repo_metadata(config, last_modified)?;

    let generator = SummaryGenerator::new(repo, &refs, &static_deltas);
    let compat = generator.compat(&mut cache, config.summary_arches(), &metadata)?;
    let compat_bytes = compat.to_bytes()?;

    let mut report = UpdateReport {
        refs: compat.len(),
        ..Default::default()
    };

    let mut index = None;
    if !options.disable_index {
        for subset in iter::once("").chain(subsets.iter().map(String::as_str)) {
            for arch in &arches {
                let summary = generator.partition(&mut cache, subset, &partition_arches(arch))?;
                let digest = store.save(&summary)?;
                let name = partition_name(subset, arch);
                tracing::debug!("partition {}: {} refs, digest {}", name, summary.len(), digest);
                report.summaries.insert(name, digest);
            }
        }
    }

    reindex_static_deltas(repo)?;

    if !options.disable_index {
        let max_history = options
            .history_length
            .unwrap_or_else(|| config.summary_history_length()) as usize;
        let built = build_index(
            old_index.as_ref().map(|(index, _)| index),
            &report.summaries,
            &mut store,
            max_history,
            metadata,
        )?;
        let bytes = built.to_bytes()?;
        let digest = Hash::digest(&bytes);
        report.index_digest = Some(digest);
        index = Some((built, bytes, digest));
    }

    // signatures are computed before any published file is replaced
    let sign = |data: &[u8]| -> Result<Option<Vec<u8>>> {
        signer
            .map(|signer| DetachedSignatures::create(signer, data)?.to_bytes())
            .transpose()
    };
    let index_sig = match &index {
        Some((_, bytes, _)) => sign(bytes)?,
        None => None,
    };
    let summary_sig = sign(&compat_bytes)?;

    let tmp = repo.tmp_path();
    match &index {
        Some((_, bytes, digest)) => {
            if let Some(sig) = &index_sig {
                write_atomic(&tmp, &store.index_sig_path(digest), sig)?;
            }
            write_atomic(&tmp, &repo.index_path(), bytes)?;
            match &index_sig {
                Some(sig) => write_atomic(&tmp, &repo.index_sig_path(), sig)?,
                None => remove_if_exists(&repo.index_sig_path())?,
            }
        }
        None => {
            remove_if_exists(&repo.index_path())?;
            remove_if_exists(&repo.index_sig_path())?;
        }
    }

    write_atomic(&tmp, &repo.summary_path(), &compat_bytes)?;
    match &summary_sig {
        Some(sig) => write_summary_sig(repo, sig)?,
        None => remove_if_exists(&repo.summary_sig_path())?,
    }

    if let Some((built, _, digest)) = &index {
        let previous = old_index.as_ref().map(|(_, digest)| digest);

        let mut referenced: HashSet<Hash> = store.cached_digests().copied().collect();
        referenced.extend(built.digests().copied());
        if let Some((old, _)) = &old_index {
            referenced.extend(old.digests().copied());
        }
        let generated: HashSet<Hash> = report.summaries.values().copied().collect();

        report.gc = store.gc(digest, previous, &referenced, &generated)?;
        tracing::debug!("gc: {:?}", report.gc);
    }

    tracing::info!(
        "published summary with {} refs and {} partitions",
        report.refs,
        report.summaries.len()
    );
    Ok(report)
}

/// replace `summary.sig`, keeping its mtime strictly increasing
///
/// the compat signature uses the same `ostree.gpgsigs` CBOR form as `summary.idx.sig`.
fn write_summary_sig(repo: &Repo, sig: &[u8]) -> Result<()> {
    let path = repo.summary_sig_path();
    let old_mtime = file_mtime(&path)?;

    write_atomic(&repo.tmp_path(), &path, sig)?;

    if let (Some(old), Some(new)) = (old_mtime, file_mtime(&path)?) {
        if new <= old {
            set_mtime(&path, old + 1)?;
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
