use crate::core::expander::ExpandedSeries;
use crate::domain::model::{MonthKey, MonthlyActivityRecord};
use crate::domain::report::{ChurnTotals, CustomerMovements, MonthlyChurn};
use std::collections::{BTreeMap, HashSet};

/// Per-month churn counts. `merge` is associative and commutative, so
/// partial tallies can be combined in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChurnTally {
    pub active: usize,
    pub churned: usize,
}

impl ChurnTally {
    pub fn absorb(&mut self, record: &MonthlyActivityRecord) {
        if record.is_active {
            self.active += 1;
        }
        if record.is_churn_month {
            self.churned += 1;
        }
    }

    pub fn merge(self, other: ChurnTally) -> ChurnTally {
        ChurnTally {
            active: self.active + other.active,
            churned: self.churned + other.churned,
        }
    }
}

pub fn tally_months<'a, I>(records: I) -> BTreeMap<MonthKey, ChurnTally>
where
    I: IntoIterator<Item = &'a MonthlyActivityRecord>,
{
    let mut tallies: BTreeMap<MonthKey, ChurnTally> = BTreeMap::new();
    for record in records {
        tallies.entry(record.month).or_default().absorb(record);
    }
    tallies
}

#[derive(Debug, Clone)]
pub struct ChurnReport {
    pub monthly: Vec<MonthlyChurn>,
    pub totals: ChurnTotals,
    pub movements: BTreeMap<MonthKey, CustomerMovements>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChurnAggregator;

impl ChurnAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, series: &ExpandedSeries) -> ChurnReport {
        let window = series.window;
        let tallies = tally_months(&series.records);

        let mut movements: BTreeMap<MonthKey, CustomerMovements> = window
            .months()
            .map(|month| (month, CustomerMovements::default()))
            .collect();

        let mut new_starts: BTreeMap<MonthKey, usize> = BTreeMap::new();
        for customer in &series.customers {
            let start = customer.record.start_month();
            if window.contains(start) {
                *new_starts.entry(start).or_default() += 1;
                if let Some(entry) = movements.get_mut(&start) {
                    entry.started.push(customer.identity().to_string());
                }
            }
        }
        for record in series.records.iter().filter(|r| r.is_churn_month) {
            if let Some(entry) = movements.get_mut(&record.month) {
                entry.churned.push(record.customer.clone());
            }
        }

        let mut monthly = Vec::new();
        let mut previous_active: Option<usize> = None;
        for month in window.months() {
            let tally = tallies.get(&month).copied().unwrap_or_default();
            let churn_rate = match previous_active {
                Some(prev) if prev > 0 => Some(tally.churned as f64 / prev as f64),
                _ => None,
            };
            monthly.push(MonthlyChurn {
                month,
                active_count: tally.active,
                new_start_count: new_starts.get(&month).copied().unwrap_or(0),
                churned_count: tally.churned,
                churn_rate,
            });
            previous_active = Some(tally.active);
        }

        let totals = Self::totals(&monthly, &series.records);
        tracing::debug!(
            "Churn: {} churned out of {} customers active in the window",
            totals.total_churned,
            totals.unique_active_customers
        );

        ChurnReport {
            monthly,
            totals,
            movements,
        }
    }

    fn totals(monthly: &[MonthlyChurn], records: &[MonthlyActivityRecord]) -> ChurnTotals {
        let total_churned: usize = monthly.iter().map(|m| m.churned_count).sum();
        let unique_active_customers = records
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.customer.as_str())
            .collect::<HashSet<_>>()
            .len();

        let rates: Vec<f64> = monthly.iter().filter_map(|m| m.churn_rate).collect();
        let average_churn_rate =
            (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);

        ChurnTotals {
            total_churned,
            unique_active_customers,
            overall_churn_rate: (unique_active_customers > 0)
                .then(|| total_churned as f64 / unique_active_customers as f64),
            average_churn_rate,
        }
    }
}
