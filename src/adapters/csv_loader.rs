use crate::domain::model::RawCustomerRecord;
use crate::domain::ports::DataLoader;
use crate::utils::error::Result;
use async_trait::async_trait;
use csv::{ReaderBuilder, Trim};
use std::path::PathBuf;

/// Reads a billing export. Column names may be the snake_case field names or
/// the export headers ("Customer Email", "Start Date (UTC)", ...).
#[derive(Debug, Clone)]
pub struct CsvDataLoader {
    path: PathBuf,
}

impl CsvDataLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(bytes: &[u8]) -> Result<Vec<RawCustomerRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(bytes);

        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: RawCustomerRecord = row?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl DataLoader for CsvDataLoader {
    async fn load_records(&self) -> Result<Vec<RawCustomerRecord>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records = Self::parse(&bytes)?;
        tracing::debug!("Read {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Hands out records that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    records: Vec<RawCustomerRecord>,
}

impl MemoryLoader {
    pub fn new(records: Vec<RawCustomerRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DataLoader for MemoryLoader {
    async fn load_records(&self) -> Result<Vec<RawCustomerRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_export_headers() {
        let csv = "Customer Email,Customer Name,Start Date (UTC),Canceled At (UTC),Amount,Status\n\
                   dana@example.com,Dana,2023-01-05 10:00:00,,150,active\n\
                   omer@example.com,Omer,2023-02-01,2023-03-15,840,canceled\n";
        let records = CsvDataLoader::parse(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].email.as_deref(), Some("dana@example.com"));
        assert_eq!(records[0].start_date.as_deref(), Some("2023-01-05 10:00:00"));
        assert!(records[0].canceled_date.as_deref().unwrap_or("").is_empty());
        assert_eq!(records[1].canceled_date.as_deref(), Some("2023-03-15"));
        assert_eq!(records[1].status.as_deref(), Some("canceled"));
    }

    #[test]
    fn test_parse_snake_case_headers_and_extra_columns() {
        let csv = "email,start_date,amount,lesson_type,weekly_frequency,coupon\n\
                   a@example.com,2023-01-01,99,Group,2,SPRING\n";
        let records = CsvDataLoader::parse(csv.as_bytes()).unwrap();
        assert_eq!(records[0].lesson_type.as_deref(), Some("Group"));
        assert_eq!(records[0].weekly_frequency.as_deref(), Some("2"));
        assert!(records[0].name.is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "email,start_date,amount").unwrap();
        writeln!(file, "a@example.com,2023-01-01,150").unwrap();

        let loader = CsvDataLoader::new(file.path());
        let records = loader.load_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(loader.describe().starts_with("csv:"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let loader = CsvDataLoader::new("/nonexistent/customers.csv");
        let err = loader.load_records().await.unwrap_err();
        assert!(matches!(err, crate::utils::error::AnalysisError::IoError(_)));
    }
}
