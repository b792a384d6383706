//! metadata key names used in commits, summaries and the summary index

// commit metadata
pub const COMMIT_METADATA: &str = "xa.metadata";
pub const COMMIT_INSTALLED_SIZE: &str = "xa.installed-size";
pub const COMMIT_DOWNLOAD_SIZE: &str = "xa.download-size";
pub const COMMIT_SUBSETS: &str = "xa.subsets";
pub const COMMIT_ENDOFLIFE: &str = "ostree.endoflife";
pub const COMMIT_ENDOFLIFE_REBASE: &str = "ostree.endoflife-rebase";
pub const COMMIT_TOKEN_TYPE: &str = "xa.token-type";
pub const COMMIT_EXTRA_DATA_SOURCES: &str = "xa.extra-data-sources";

// per-ref record metadata
/// (installed size, download size, metadata text)
pub const XA_DATA: &str = "xa.data";
/// commit timestamp, new format
pub const TIMESTAMP: &str = "ts";
/// commit timestamp, compat format
pub const COMMIT_TIMESTAMP: &str = "ostree.commit.timestamp";

// sparse data
pub const SPARSE_ENDOFLIFE: &str = "eol";
pub const SPARSE_ENDOFLIFE_REBASE: &str = "eolr";
pub const SPARSE_TOKEN_TYPE: &str = "tokt";
/// (number of extra data sources, total download size)
pub const SPARSE_EXTRA_DATA_SIZE: &str = "eds";

pub const SPARSE_KEYS: [&str; 4] = [
    SPARSE_ENDOFLIFE,
    SPARSE_ENDOFLIFE_REBASE,
    SPARSE_TOKEN_TYPE,
    SPARSE_EXTRA_DATA_SIZE,
];

// summary and index metadata
pub const XA_CACHE: &str = "xa.cache";
pub const XA_SPARSE_CACHE: &str = "xa.sparse-cache";
pub const CACHE_VERSION: &str = "xa.cache-version";
pub const STATIC_DELTAS: &str = "ostree.static-deltas";
pub const LAST_MODIFIED: &str = "ostree.summary.last-modified";
pub const COLLECTION_ID: &str = "ostree.summary.collection-id";
pub const DEPLOY_COLLECTION_ID: &str = "ostree.deploy-collection-id";
pub const TITLE: &str = "xa.title";
pub const COMMENT: &str = "xa.comment";
pub const DESCRIPTION: &str = "xa.description";
pub const HOMEPAGE: &str = "xa.homepage";
pub const ICON: &str = "xa.icon";
pub const DEFAULT_BRANCH: &str = "xa.default-branch";
pub const REDIRECT_URL: &str = "xa.redirect-url";
pub const AUTHENTICATOR_NAME: &str = "xa.authenticator-name";
pub const GPG_KEYS: &str = "xa.gpg-keys";
