pub mod admission;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod registry;
pub mod result;
pub mod store;
pub mod sync_crawler;
pub mod traversal;

pub use admission::{Admission, admit};
pub use error::{Result, ScanError};
pub use extract::{extract_hyperlinks, normalize_url};
pub use fetch::{HttpFetcher, PageFetcher};
pub use registry::VisitedRegistry;
pub use result::{StopReason, TraversalReport};
pub use store::{GraphStore, MemoryGraphStore, UrlRank};
pub use sync_crawler::SyncCrawler;
pub use traversal::{StopHandle, Traversal, TraversalConfig, TraversalState};
