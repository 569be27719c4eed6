// Observability: metrics recording and export

pub mod metrics;

// Re-export main functions for ease of use
pub use metrics::{init, render, write_snapshot};
