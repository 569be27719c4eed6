pub mod ndjson_load_adapter;
pub mod sqlite_load_adapter;

pub use ndjson_load_adapter::NdjsonLoadAdapter;
pub use sqlite_load_adapter::SqliteLoadAdapter;
