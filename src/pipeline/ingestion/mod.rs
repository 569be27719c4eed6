// Pipeline ingestion: extract discovery and CSV reading

pub mod discovery;
pub mod raw;

pub use discovery::{discover_all, DiscoveredSources, ExtractFile};
