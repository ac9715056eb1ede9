use crate::domain::model::{
    AnalysisWindow, CustomerRecord, MatchedCustomer, MonthKey, MonthlyActivityRecord,
};
use crate::utils::error::RecordError;

/// Picks the analysis window. Explicit bounds win; otherwise the window spans
/// every record's start and cancellation months, ending at the as-of month
/// when one is configured.
///
/// A missing bound never inverts the window: a defaulted `to` is lifted to an
/// explicit `from`, and a defaulted `from` is lowered to an explicit `to`.
/// Only two explicit bounds in the wrong order, or no bounds and no records,
/// give `None`.
pub fn resolve_window<'a, I>(
    from: Option<MonthKey>,
    to: Option<MonthKey>,
    as_of: Option<MonthKey>,
    records: I,
) -> Option<AnalysisWindow>
where
    I: IntoIterator<Item = &'a CustomerRecord>,
{
    let mut observed_from: Option<MonthKey> = None;
    let mut observed_to: Option<MonthKey> = None;
    for record in records {
        let start = record.start_month();
        let last = record.cancel_month().map_or(start, |cancel| cancel.max(start));
        observed_from = Some(observed_from.map_or(start, |m| m.min(start)));
        observed_to = Some(observed_to.map_or(last, |m| m.max(last)));
    }

    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => (from, as_of.or(observed_to).map_or(from, |t| t.max(from))),
        (None, Some(to)) => (observed_from.map_or(to, |f| f.min(to)), to),
        (None, None) => (observed_from?, as_of.or(observed_to)?),
    };
    AnalysisWindow::new(from, to)
}

/// Immutable snapshot handed to the aggregators: the customers that expanded
/// cleanly and their activity inside the window.
#[derive(Debug, Clone)]
pub struct ExpandedSeries {
    pub window: AnalysisWindow,
    pub customers: Vec<MatchedCustomer>,
    pub records: Vec<MonthlyActivityRecord>,
}

#[derive(Debug, Clone)]
pub struct ExpansionFailure {
    pub customer: MatchedCustomer,
    pub error: RecordError,
}

/// Expands matched customers into monthly activity inside one window.
#[derive(Debug, Clone, Copy)]
pub struct ContractExpander {
    window: AnalysisWindow,
}

impl ContractExpander {
    pub fn new(window: AnalysisWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> AnalysisWindow {
        self.window
    }

    /// Start and end month of the customer's natural active range. Open
    /// subscriptions run through the window end.
    pub fn natural_range(
        &self,
        customer: &MatchedCustomer,
    ) -> Result<(MonthKey, MonthKey), RecordError> {
        let record = &customer.record;
        if let Some(canceled) = record.canceled_date {
            if canceled < record.start_date {
                return Err(RecordError::InvalidDateRange {
                    start: record.start_date,
                    canceled,
                });
            }
        }
        let end = record.cancel_month().unwrap_or(self.window.to);
        Ok((record.start_month(), end))
    }

    /// One record per active month in the clipped range. A customer entirely
    /// outside the window yields an empty vector.
    pub fn expand(
        &self,
        customer: &MatchedCustomer,
    ) -> Result<Vec<MonthlyActivityRecord>, RecordError> {
        let (start, end) = self.natural_range(customer)?;
        let churn_month = customer.record.cancel_month();
        let monthly_price = customer.monthly_price();

        let from = start.max(self.window.from);
        let to = end.min(self.window.to);

        Ok(MonthKey::range(from, to)
            .map(|month| MonthlyActivityRecord {
                customer: customer.identity().to_string(),
                month,
                is_active: true,
                is_churn_month: churn_month == Some(month),
                attributed_revenue: monthly_price,
            })
            .collect())
    }

    /// Expands every customer. Customers whose dates are inconsistent are
    /// returned separately instead of being expanded.
    pub fn expand_all(
        &self,
        customers: Vec<MatchedCustomer>,
    ) -> (ExpandedSeries, Vec<ExpansionFailure>) {
        let mut kept = Vec::with_capacity(customers.len());
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for customer in customers {
            match self.expand(&customer) {
                Ok(mut months) => {
                    records.append(&mut months);
                    kept.push(customer);
                }
                Err(error) => {
                    tracing::warn!("⚠️ Not expanding {}: {}", customer.identity(), error);
                    failures.push(ExpansionFailure { customer, error });
                }
            }
        }

        tracing::debug!(
            "Expanded {} customers into {} monthly records for {}..={}",
            kept.len(),
            records.len(),
            self.window.from,
            self.window.to
        );

        (
            ExpandedSeries {
                window: self.window,
                customers: kept,
                records,
            },
            failures,
        )
    }
}
