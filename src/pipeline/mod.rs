// Data processing pipeline: extract ingestion and table transforms

pub mod ingestion;
pub mod processing;

// Re-export key types from each stage
pub use processing::{ProcessingOptions, TableOutput};
