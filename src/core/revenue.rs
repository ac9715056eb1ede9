use crate::core::expander::ExpandedSeries;
use crate::domain::model::{BillingMode, MatchedCustomer, MonthKey, MonthlyActivityRecord};
use crate::domain::report::{
    CustomerLifetimeValue, MonthlyRevenue, RevenueBreakdown, RevenueRange, RevenueSummary,
    RevenueTotals,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Revenue a monthly record contributes under `mode`.
pub fn billed_revenue(record: &MonthlyActivityRecord, mode: BillingMode) -> f64 {
    if record.is_active && (mode.bills_churn_month() || !record.is_churn_month) {
        record.attributed_revenue
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevenueTally {
    pub revenue: f64,
    pub churned_revenue: f64,
    pub billed_months: usize,
}

impl RevenueTally {
    fn absorb(&mut self, record: &MonthlyActivityRecord, mode: BillingMode) {
        let billed = billed_revenue(record, mode);
        if billed > 0.0 {
            self.revenue += billed;
            self.billed_months += 1;
        }
        if record.is_churn_month {
            self.churned_revenue += record.attributed_revenue;
        }
    }

    pub fn merge(self, other: RevenueTally) -> RevenueTally {
        RevenueTally {
            revenue: self.revenue + other.revenue,
            churned_revenue: self.churned_revenue + other.churned_revenue,
            billed_months: self.billed_months + other.billed_months,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RevenueAggregator {
    billing_mode: BillingMode,
}

impl RevenueAggregator {
    pub fn new(billing_mode: BillingMode) -> Self {
        Self { billing_mode }
    }

    pub fn billing_mode(&self) -> BillingMode {
        self.billing_mode
    }

    pub fn aggregate(&self, series: &ExpandedSeries) -> RevenueSummary {
        let monthly = self.monthly_series(series, series.records.iter());
        let totals = Self::totals(&monthly);

        let lifetime_values = series
            .customers
            .iter()
            .map(|c| (c.identity().to_string(), self.lifetime_value(c, series.window.to)))
            .collect();

        let by_lesson_type = self.breakdown(series, |c| c.plan.lesson_type.to_string());
        let by_duration = self.breakdown(series, |c| c.plan.duration_bucket());
        let by_plan = self.breakdown(series, |c| c.plan.label.clone());
        let by_weekly_frequency = self.breakdown(series, |c| c.plan.frequency_bucket());

        tracing::debug!(
            "Revenue ({}): total {:.2}, churned {:.2}",
            self.billing_mode,
            totals.total_revenue,
            totals.total_churned_revenue
        );

        RevenueSummary {
            billing_mode: self.billing_mode,
            monthly,
            totals,
            lifetime_values,
            by_lesson_type,
            by_duration,
            by_plan,
            by_weekly_frequency,
        }
    }

    fn tally<'a>(
        &self,
        records: impl Iterator<Item = &'a MonthlyActivityRecord>,
    ) -> BTreeMap<MonthKey, RevenueTally> {
        let mut tallies: BTreeMap<MonthKey, RevenueTally> = BTreeMap::new();
        for record in records {
            tallies
                .entry(record.month)
                .or_default()
                .absorb(record, self.billing_mode);
        }
        tallies
    }

    fn monthly_series<'a>(
        &self,
        series: &ExpandedSeries,
        records: impl Iterator<Item = &'a MonthlyActivityRecord>,
    ) -> Vec<MonthlyRevenue> {
        let tallies = self.tally(records);
        series
            .window
            .months()
            .map(|month| {
                let tally = tallies.get(&month).copied().unwrap_or_default();
                MonthlyRevenue {
                    month,
                    revenue: tally.revenue,
                    churned_revenue: tally.churned_revenue,
                }
            })
            .collect()
    }

    fn totals(monthly: &[MonthlyRevenue]) -> RevenueTotals {
        let total_revenue: f64 = monthly.iter().map(|m| m.revenue).sum();
        let total_churned_revenue = monthly.iter().map(|m| m.churned_revenue).sum();
        let months = monthly.len();
        let average_monthly_revenue = if months > 0 {
            total_revenue / months as f64
        } else {
            0.0
        };

        let range = (months > 0).then(|| {
            let values = monthly.iter().map(|m| m.revenue);
            let min = values.clone().fold(f64::INFINITY, f64::min);
            let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
            let std_dev = (months > 1).then(|| {
                let variance = values
                    .map(|v| (v - average_monthly_revenue).powi(2))
                    .sum::<f64>()
                    / (months - 1) as f64;
                variance.sqrt()
            });
            RevenueRange { min, max, std_dev }
        });

        RevenueTotals {
            total_revenue,
            total_churned_revenue,
            average_monthly_revenue,
            range,
        }
    }

    /// Lifetime value over the customer's full natural range, ignoring the
    /// window start. Open subscriptions count through `horizon`.
    pub fn lifetime_value(&self, customer: &MatchedCustomer, horizon: MonthKey) -> CustomerLifetimeValue {
        let start = customer.record.start_month();
        let churn_month = customer.record.cancel_month();
        let end = churn_month.unwrap_or(horizon);

        let mut months = start.months_through(end);
        if churn_month.is_some() && months > 0 && !self.billing_mode.bills_churn_month() {
            months -= 1;
        }

        let total_revenue = customer.monthly_price() * f64::from(months);
        CustomerLifetimeValue {
            total_revenue,
            months,
            average_monthly_revenue: if months > 0 {
                total_revenue / f64::from(months)
            } else {
                0.0
            },
        }
    }

    fn breakdown<F>(&self, series: &ExpandedSeries, key: F) -> BTreeMap<String, RevenueBreakdown>
    where
        F: Fn(&MatchedCustomer) -> String,
    {
        let category_of: HashMap<&str, String> = series
            .customers
            .iter()
            .map(|c| (c.identity(), key(c)))
            .collect();

        let mut partitions: BTreeMap<String, Vec<&MonthlyActivityRecord>> = category_of
            .values()
            .map(|category| (category.clone(), Vec::new()))
            .collect();
        for record in &series.records {
            if let Some(category) = category_of.get(record.customer.as_str()) {
                if let Some(bucket) = partitions.get_mut(category) {
                    bucket.push(record);
                }
            }
        }

        partitions
            .into_iter()
            .map(|(category, records)| {
                let combined = self
                    .tally(records.iter().copied())
                    .into_values()
                    .fold(RevenueTally::default(), RevenueTally::merge);
                let unique_customers = records
                    .iter()
                    .map(|r| r.customer.as_str())
                    .collect::<HashSet<_>>()
                    .len();

                let breakdown = RevenueBreakdown {
                    total_revenue: combined.revenue,
                    churned_revenue: combined.churned_revenue,
                    billed_months: combined.billed_months,
                    unique_customers,
                    average_monthly_price: if combined.billed_months > 0 {
                        combined.revenue / combined.billed_months as f64
                    } else {
                        0.0
                    },
                    monthly: self.monthly_series(series, records.into_iter()),
                };
                (category, breakdown)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::PlanCatalog;
    use crate::core::expander::ContractExpander;
    use crate::domain::model::{AnalysisWindow, CustomerRecord};
    use chrono::NaiveDate;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn customer(email: &str, start: &str, cancel: Option<&str>, plan: &str, cost: f64) -> MatchedCustomer {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let catalog = PlanCatalog::default_catalog();
        MatchedCustomer {
            record: CustomerRecord {
                email: email.to_string(),
                name: None,
                start_date: date(start),
                canceled_date: cancel.map(date),
                amount: cost,
                lesson_type: None,
                weekly_frequency: None,
                status: None,
            },
            plan: catalog.by_label(plan).unwrap().clone(),
            cost_option: cost,
        }
    }

    fn sample() -> ExpandedSeries {
        let window = AnalysisWindow::new(month("2023-01"), month("2023-06")).unwrap();
        let (series, _) = ContractExpander::new(window).expand_all(vec![
            customer("a@example.com", "2023-01-01", Some("2023-04-10"), "Private-Month", 150.0),
            customer("b@example.com", "2022-10-01", None, "Private_6_Months", 840.0),
            customer("c@example.com", "2023-03-01", Some("2023-05-01"), "Group-Month", 80.0),
        ]);
        series
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_in_advance_bills_churn_month() {
        let summary = RevenueAggregator::new(BillingMode::InAdvance).aggregate(&sample());
        let april = summary.monthly.iter().find(|m| m.month == month("2023-04")).unwrap();
        assert!(approx(april.revenue, 150.0 + 140.0 + 80.0));
        assert!(approx(april.churned_revenue, 150.0));
    }

    #[test]
    fn test_in_arrears_excludes_churn_month() {
        let summary = RevenueAggregator::new(BillingMode::InArrears).aggregate(&sample());
        let april = summary.monthly.iter().find(|m| m.month == month("2023-04")).unwrap();
        assert!(approx(april.revenue, 140.0 + 80.0));
        assert!(approx(april.churned_revenue, 150.0));
        let may = summary.monthly.iter().find(|m| m.month == month("2023-05")).unwrap();
        assert!(approx(may.revenue, 140.0));
        assert!(approx(may.churned_revenue, 80.0));
    }

    #[test]
    fn test_monthly_sum_equals_clipped_contributions() {
        let sample = sample();
        for mode in [BillingMode::InAdvance, BillingMode::InArrears] {
            let summary = RevenueAggregator::new(mode).aggregate(&sample);
            let per_customer: f64 = sample
                .customers
                .iter()
                .map(|c| {
                    sample
                        .records
                        .iter()
                        .filter(|r| r.customer == c.identity())
                        .map(|r| billed_revenue(r, mode))
                        .sum::<f64>()
                })
                .sum();
            assert!(approx(summary.totals.total_revenue, per_customer));
            let monthly_sum: f64 = summary.monthly.iter().map(|m| m.revenue).sum();
            assert!(approx(monthly_sum, per_customer));
        }
    }

    #[test]
    fn test_lifetime_value_ignores_window_start() {
        let summary = RevenueAggregator::new(BillingMode::InAdvance).aggregate(&sample());
        // b started in October 2022 and is still active at the June 2023 window end
        let b = &summary.lifetime_values["b@example.com"];
        assert_eq!(b.months, 9);
        assert!(approx(b.total_revenue, 9.0 * 140.0));

        let arrears = RevenueAggregator::new(BillingMode::InArrears).aggregate(&sample());
        let a = &arrears.lifetime_values["a@example.com"];
        assert_eq!(a.months, 3);
        assert!(approx(a.total_revenue, 450.0));
    }

    #[test]
    fn test_breakdowns_partition_revenue() {
        let summary = RevenueAggregator::new(BillingMode::InAdvance).aggregate(&sample());
        let by_type_total: f64 = summary.by_lesson_type.values().map(|b| b.total_revenue).sum();
        let by_duration_total: f64 = summary.by_duration.values().map(|b| b.total_revenue).sum();
        assert!(approx(by_type_total, summary.totals.total_revenue));
        assert!(approx(by_duration_total, summary.totals.total_revenue));

        let private = &summary.by_lesson_type["Private"];
        assert_eq!(private.unique_customers, 2);
        let group = &summary.by_lesson_type["Group"];
        assert_eq!(group.billed_months, 3);
        assert!(approx(group.average_monthly_price, 80.0));
        assert!(summary.by_duration.contains_key("6_months"));
    }

    #[test]
    fn test_plan_and_frequency_breakdowns() {
        let summary = RevenueAggregator::new(BillingMode::InAdvance).aggregate(&sample());

        let labels: Vec<&str> = summary.by_plan.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["Group-Month", "Private-Month", "Private_6_Months"]);
        let by_plan_total: f64 = summary.by_plan.values().map(|b| b.total_revenue).sum();
        assert!(approx(by_plan_total, summary.totals.total_revenue));
        assert!(approx(summary.by_plan["Private-Month"].total_revenue, 4.0 * 150.0));
        assert_eq!(summary.by_plan["Private_6_Months"].unique_customers, 1);

        assert_eq!(summary.by_weekly_frequency.len(), 1);
        let weekly = &summary.by_weekly_frequency["1_per_week"];
        assert_eq!(weekly.unique_customers, 3);
        assert!(approx(weekly.total_revenue, summary.totals.total_revenue));
    }

    #[test]
    fn test_revenue_range() {
        let summary = RevenueAggregator::new(BillingMode::InAdvance).aggregate(&sample());
        let range = summary.totals.range.unwrap();
        assert!(approx(range.min, 140.0));
        assert!(approx(range.max, 370.0));
        assert!(range.std_dev.unwrap() > 0.0);
    }
}
