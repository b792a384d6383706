//! summaries, the summary index and the deltas between summaries

pub mod commit_data;
pub mod diff;
pub mod format;
pub mod generate;
pub mod index;
pub mod keys;
mod metadata;
pub mod store;

pub use commit_data::{CommitData, CommitDataCache, CACHE_VERSION};
pub use format::{Summary, SummaryLayout, SummaryRef, SUMMARY_MAGIC};
pub use generate::{SummaryFormat, SummaryGenerator};
pub use index::{build_index, partition_name, parse_partition_name, SubsummaryEntry, SummaryIndex};
pub use metadata::repo_metadata;
pub use store::{DigestedSummaryStore, GcStats};
