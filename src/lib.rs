pub mod column_registry;
pub mod column_stats;
pub mod config;
pub mod database_schema;
pub mod error;
pub mod reconcile;
pub mod registry_file;
pub mod report;
pub mod table_registry;
pub mod types;
pub mod workflow;

pub use error::{Error, Result};
