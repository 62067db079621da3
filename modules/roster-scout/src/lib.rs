pub mod coordinator;
pub mod extractor;
pub mod fetcher;
pub mod images;
pub mod matcher;
pub mod pacing;
pub mod photo;
pub mod policy;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use coordinator::{Coordinator, RunOptions};
pub use extractor::extract;
pub use fetcher::{BrowserlessFetcher, FetchError, HttpFetcher, PageFetcher, SettlePolicy};
pub use matcher::match_candidates;
pub use photo::PhotoResolver;
pub use stats::{save_run_report, RunReport, TeamOutcome, TeamReport};
