pub mod catalog;
pub mod churn;
pub mod dedup;
pub mod engine;
pub mod expander;
pub mod filters;
pub mod matcher;
pub mod revenue;
pub mod validate;

pub use crate::domain::ports::{DataLoader, Filter, FilterSubject};
pub use crate::utils::error::Result;
