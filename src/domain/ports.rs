use crate::domain::model::{CustomerRecord, LessonPlan, RawCustomerRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of already column-normalized customer rows.
#[async_trait]
pub trait DataLoader: Send + Sync {
    async fn load_records(&self) -> Result<Vec<RawCustomerRecord>>;

    fn describe(&self) -> String;
}

/// What a filter gets to look at: the resolved record and, when the amount
/// matched the catalog, its plan.
#[derive(Debug, Clone, Copy)]
pub struct FilterSubject<'a> {
    pub record: &'a CustomerRecord,
    pub plan: Option<&'a LessonPlan>,
}

pub trait Filter: Send + Sync {
    /// `true` keeps the customer.
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool;

    fn describe(&self) -> String;
}
