pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{CsvDataLoader, MemoryLoader};
pub use crate::config::AnalysisConfig;
pub use crate::core::engine::{AnalysisEngine, AnalysisRequest};
pub use crate::domain::model::{BillingMode, MonthKey};
pub use crate::domain::report::AnalysisOutcome;
pub use crate::utils::error::{AnalysisError, Result};
