//! building summaries from the repository refs
//!
//! two formats are produced. the compat summary covers the whole repository and
//! carries per-ref data in flat `xa.cache` / `xa.sparse-cache` maps. partitioned
//! summaries cover one (subset, arch) pair each and embed the data in each record.

use std::collections::{BTreeMap, HashSet};

use crate::deltas::StaticDelta;
use crate::error::Result;
use crate::hash::Hash;
use crate::repo::Repo;
use crate::summary::commit_data::{CommitData, CommitDataCache, CACHE_VERSION};
use crate::summary::format::{Summary, SummaryRef};
use crate::summary::keys;
use crate::types::refname::{
    appstream_subset, is_package_ref, is_payload_ref, is_subset_appstream_ref, ref_arch,
    APPSTREAM2_PREFIX,
};
use crate::types::{MetaDict, MetaValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryFormat {
    /// single repo-wide summary readable by older clients
    Compat,
    /// per-partition summary referenced from the index
    Partitioned,
}

/// which refs a summary covers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubsetFilter<'s> {
    /// everything, as in the compat summary
    All,
    /// the default partition: everything except subset appstream refs
    Default,
    Named(&'s str),
}

impl<'s> SubsetFilter<'s> {
    fn from_name(subset: &'s str) -> Self {
        if subset.is_empty() {
            SubsetFilter::Default
        } else {
            SubsetFilter::Named(subset)
        }
    }
}

/// generates summaries for one snapshot of the refs
pub struct SummaryGenerator<'a> {
    repo: &'a Repo,
    refs: &'a BTreeMap<String, Hash>,
    static_deltas: &'a [StaticDelta],
}

impl<'a> SummaryGenerator<'a> {
    pub fn new(
        repo: &'a Repo,
        refs: &'a BTreeMap<String, Hash>,
        static_deltas: &'a [StaticDelta],
    ) -> Self {
        Self {
            repo,
            refs,
            static_deltas,
        }
    }

    /// the compat summary, optionally restricted to some arches
    ///
    /// `repo_metadata` is merged into the summary metadata as is.
    pub fn compat(
        &self,
        cache: &mut CommitDataCache,
        arches: Option<&[String]>,
        repo_metadata: &MetaDict,
    ) -> Result<Summary> {
        let records = self.records(cache, SummaryFormat::Compat, SubsetFilter::All, arches)?;

        let mut xa_cache = MetaDict::new();
        let mut sparse_cache = MetaDict::new();
        for (record, data) in &records {
            if is_package_ref(&record.name) {
                xa_cache.insert(record.name.clone(), data.xa_data());
            }
            if let Some(sparse) = &data.sparse_data {
                sparse_cache.insert(record.name.clone(), MetaValue::Map(sparse.clone()));
            }
        }

        let mut metadata = repo_metadata.clone();
        metadata.insert(keys::XA_CACHE.to_string(), MetaValue::Map(xa_cache));
        if !sparse_cache.is_empty() {
            metadata.insert(
                keys::XA_SPARSE_CACHE.to_string(),
                MetaValue::Map(sparse_cache),
            );
        }
        metadata.insert(keys::CACHE_VERSION.to_string(), MetaValue::U32(CACHE_VERSION));

        self.finish(records, metadata)
    }

    /// the summary for one partition; an empty subset is the default partition
    pub fn partition(
        &self,
        cache: &mut CommitDataCache,
        subset: &str,
        arches: &[String],
    ) -> Result<Summary> {
        let records = self.records(
            cache,
            SummaryFormat::Partitioned,
            SubsetFilter::from_name(subset),
            Some(arches),
        )?;
        self.finish(records, MetaDict::new())
    }

    /// records for the refs that pass the filters, with the data they were built from
    fn records(
        &self,
        cache: &mut CommitDataCache,
        format: SummaryFormat,
        subset: SubsetFilter<'_>,
        arches: Option<&[String]>,
    ) -> Result<Vec<(SummaryRef, CommitData)>> {
        let mut records = Vec::new();

        for (name, checksum) in self.refs {
            if !self.include_ref(cache, name, checksum, subset, arches)? {
                continue;
            }

            let data = cache.ensure(self.repo, checksum)?;
            let mut metadata = MetaDict::new();
            match format {
                SummaryFormat::Compat => {
                    metadata.insert(
                        keys::COMMIT_TIMESTAMP.to_string(),
                        MetaValue::U64(data.commit_timestamp),
                    );
                }
                SummaryFormat::Partitioned => {
                    if is_payload_ref(name) {
                        metadata.insert(keys::XA_DATA.to_string(), data.xa_data());
                    }
                    if let Some(sparse) = &data.sparse_data {
                        metadata.extend(sparse.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    metadata.insert(
                        keys::TIMESTAMP.to_string(),
                        MetaValue::U64(data.commit_timestamp),
                    );
                }
            }

            let record = SummaryRef::new(name.as_str(), data.commit_size, *checksum, metadata);
            records.push((record, data.clone()));
        }

        Ok(records)
    }

    fn include_ref(
        &self,
        cache: &mut CommitDataCache,
        name: &str,
        checksum: &Hash,
        subset: SubsetFilter<'_>,
        arches: Option<&[String]>,
    ) -> Result<bool> {
        // refs without an arch are in every partition
        if let (Some(arches), Some(arch)) = (arches, ref_arch(name)) {
            if !arches.iter().any(|a| a == arch) {
                return Ok(false);
            }
        }

        match subset {
            SubsetFilter::All => Ok(true),
            SubsetFilter::Default => Ok(!is_subset_appstream_ref(name)),
            SubsetFilter::Named(subset) => match appstream_subset(name) {
                // the legacy appstream branch has no per-subset variant
                Some((ref_subset, _)) => {
                    Ok(name.starts_with(APPSTREAM2_PREFIX) && ref_subset == Some(subset))
                }
                None if is_payload_ref(name) => {
                    Ok(cache.ensure(self.repo, checksum)?.in_subset(subset))
                }
                None => Ok(false),
            },
        }
    }

    /// attach the static deltas that lead to included commits and build the summary
    fn finish(
        &self,
        records: Vec<(SummaryRef, CommitData)>,
        mut metadata: MetaDict,
    ) -> Result<Summary> {
        let included: HashSet<Hash> = records.iter().map(|(r, _)| r.checksum).collect();

        let deltas: MetaDict = self
            .static_deltas
            .iter()
            .filter(|delta| included.contains(&delta.to))
            .map(|delta| {
                (
                    delta.name.clone(),
                    MetaValue::Bytes(delta.digest.as_bytes().to_vec()),
                )
            })
            .collect();
        metadata.insert(keys::STATIC_DELTAS.to_string(), MetaValue::Map(deltas));

        Summary::new(records.into_iter().map(|(r, _)| r).collect(), metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{write_commit, write_tree};
    use crate::types::{Commit, Tree};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn commit(repo: &Repo, subject: &str, subsets: &[&str]) -> Hash {
        let tree = write_tree(repo, &Tree::empty()).unwrap();
        let mut commit = Commit::with_timestamp(tree, vec![], 1000, subject)
            .with_metadata(keys::COMMIT_METADATA, format!("[Application]\nname={}\n", subject))
            .with_metadata(keys::COMMIT_INSTALLED_SIZE, 10u64)
            .with_metadata(keys::COMMIT_DOWNLOAD_SIZE, 5u64);
        if !subsets.is_empty() {
            commit = commit.with_metadata(
                keys::COMMIT_SUBSETS,
                MetaValue::StrList(subsets.iter().map(|s| s.to_string()).collect()),
            );
        }
        write_commit(repo, &commit).unwrap()
    }

    fn arches(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn names(summary: &Summary) -> Vec<&str> {
        summary.refs().iter().map(|r| r.name.as_str()).collect()
    }

    fn sample_refs(repo: &Repo) -> BTreeMap<String, Hash> {
        BTreeMap::from([
            (
                "app/org.foo.Bar/x86_64/stable".to_string(),
                commit(repo, "org.foo.Bar", &[]),
            ),
            (
                "app/org.foo.Locale/x86_64/stable".to_string(),
                commit(repo, "org.foo.Locale", &["locale"]),
            ),
            (
                "runtime/org.foo.Compat/i386/1.0".to_string(),
                commit(repo, "org.foo.Compat", &[]),
            ),
            (
                "app/org.foo.Arm/aarch64/stable".to_string(),
                commit(repo, "org.foo.Arm", &["locale"]),
            ),
            ("appstream/x86_64".to_string(), commit(repo, "as", &[])),
            ("appstream2/x86_64".to_string(), commit(repo, "as2", &[])),
            (
                "appstream2/locale-x86_64".to_string(),
                commit(repo, "as2-locale", &[]),
            ),
            ("ostree-metadata".to_string(), commit(repo, "meta", &[])),
        ])
    }

    #[test]
    fn test_default_partition() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let generator = SummaryGenerator::new(&repo, &refs, &[]);
        let mut cache = CommitDataCache::new();

        let summary = generator
            .partition(&mut cache, "", &arches(&["x86_64", "i386"]))
            .unwrap();
        assert_eq!(
            names(&summary),
            vec![
                "app/org.foo.Bar/x86_64/stable",
                "app/org.foo.Locale/x86_64/stable",
                "appstream/x86_64",
                "appstream2/x86_64",
                "ostree-metadata",
                "runtime/org.foo.Compat/i386/1.0",
            ]
        );

        let bar = summary.lookup("app/org.foo.Bar/x86_64/stable").unwrap();
        assert_eq!(
            bar.metadata.get(keys::XA_DATA),
            Some(&MetaValue::List(vec![
                MetaValue::U64(10),
                MetaValue::U64(5),
                MetaValue::str("[Application]\nname=org.foo.Bar\n"),
            ]))
        );
        assert_eq!(bar.metadata.get(keys::TIMESTAMP), Some(&MetaValue::U64(1000)));
        assert!(bar.metadata.get(keys::COMMIT_TIMESTAMP).is_none());

        let meta = summary.lookup("ostree-metadata").unwrap();
        assert!(meta.metadata.get(keys::XA_DATA).is_none());
    }

    #[test]
    fn test_named_subset_partition() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let generator = SummaryGenerator::new(&repo, &refs, &[]);
        let mut cache = CommitDataCache::new();

        let summary = generator
            .partition(&mut cache, "locale", &arches(&["x86_64", "i386"]))
            .unwrap();
        assert_eq!(
            names(&summary),
            vec!["app/org.foo.Locale/x86_64/stable", "appstream2/locale-x86_64"]
        );

        let arm = generator
            .partition(&mut cache, "locale", &arches(&["aarch64", "arm"]))
            .unwrap();
        assert_eq!(names(&arm), vec!["app/org.foo.Arm/aarch64/stable"]);
    }

    #[test]
    fn test_empty_partition_is_valid() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let generator = SummaryGenerator::new(&repo, &refs, &[]);

        let summary = generator
            .partition(&mut CommitDataCache::new(), "nothing", &arches(&["x86_64"]))
            .unwrap();
        assert!(summary.is_empty());
        assert!(summary.to_bytes().is_ok());
    }

    #[test]
    fn test_partition_is_deterministic() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let generator = SummaryGenerator::new(&repo, &refs, &[]);

        let a = generator
            .partition(&mut CommitDataCache::new(), "", &arches(&["x86_64"]))
            .unwrap();
        let b = generator
            .partition(&mut CommitDataCache::new(), "", &arches(&["x86_64"]))
            .unwrap();
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_compat_summary() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let generator = SummaryGenerator::new(&repo, &refs, &[]);
        let mut cache = CommitDataCache::new();
        let repo_meta = MetaDict::from([(keys::TITLE.to_string(), MetaValue::str("Test"))]);

        let summary = generator.compat(&mut cache, None, &repo_meta).unwrap();
        assert_eq!(summary.len(), refs.len());

        let bar = summary.lookup("app/org.foo.Bar/x86_64/stable").unwrap();
        assert_eq!(
            bar.metadata.get(keys::COMMIT_TIMESTAMP),
            Some(&MetaValue::U64(1000))
        );
        assert!(bar.metadata.get(keys::XA_DATA).is_none());

        let meta = summary.metadata();
        assert_eq!(meta.get(keys::TITLE), Some(&MetaValue::str("Test")));
        assert_eq!(
            meta.get(keys::CACHE_VERSION),
            Some(&MetaValue::U32(CACHE_VERSION))
        );
        let xa_cache = meta.get(keys::XA_CACHE).unwrap().as_map().unwrap();
        assert_eq!(xa_cache.len(), 4);
        assert!(!xa_cache.contains_key("appstream2/x86_64"));

        let limited = generator
            .compat(&mut cache, Some(&arches(&["aarch64"])), &repo_meta)
            .unwrap();
        assert_eq!(
            names(&limited),
            vec!["app/org.foo.Arm/aarch64/stable", "ostree-metadata"]
        );
    }

    #[test]
    fn test_static_deltas_follow_included_refs() {
        let (_dir, repo) = test_repo();
        let refs = sample_refs(&repo);
        let bar = refs["app/org.foo.Bar/x86_64/stable"];
        let arm = refs["app/org.foo.Arm/aarch64/stable"];
        let deltas = vec![
            StaticDelta {
                name: bar.to_hex(),
                to: bar,
                digest: Hash::digest(b"bar"),
            },
            StaticDelta {
                name: arm.to_hex(),
                to: arm,
                digest: Hash::digest(b"arm"),
            },
        ];
        let generator = SummaryGenerator::new(&repo, &refs, &deltas);

        let summary = generator
            .partition(&mut CommitDataCache::new(), "", &arches(&["x86_64"]))
            .unwrap();
        let advertised = summary
            .metadata()
            .get(keys::STATIC_DELTAS)
            .unwrap()
            .as_map()
            .unwrap();
        assert_eq!(advertised.len(), 1);
        assert_eq!(
            advertised.get(&bar.to_hex()),
            Some(&MetaValue::Bytes(Hash::digest(b"bar").as_bytes().to_vec()))
        );
    }
}
