//! Raw table handling: ingestion, schema inference, cleaning, summaries and persistence.

pub mod clean;
pub mod schema;
pub mod source;
pub mod storage;
pub mod table;
pub mod validate;

pub use clean::{CleanReport, Cleaner};
pub use schema::{ColumnType, SchemaDefinition};
pub use source::{CsvSource, DataBatch, DataSource, DataSourceInfo};
pub use storage::RunManifest;
pub use table::{Record, RecordSequence, Timestamp};
pub use validate::DataSummary;
