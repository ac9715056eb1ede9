// Adapters layer: concrete implementations of the domain ports.

pub mod csv_loader;

pub use csv_loader::{CsvDataLoader, MemoryLoader};
