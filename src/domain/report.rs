//! Result and report structures produced by one analysis run.
//!
//! Everything here is built once by the engine and never mutated afterwards.

use crate::domain::model::{
    AnalysisWindow, BillingMode, CustomerRecord, LessonType, MonthKey,
};
use crate::utils::error::RecordError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    /// Zero-based position in the loaded input; `None` for customers rejected
    /// after duplicate resolution.
    pub row: Option<usize>,
    pub identity: Option<String>,
    pub reason: String,
    #[serde(skip)]
    pub error: RecordError,
}

impl SkippedRecord {
    pub fn new(row: Option<usize>, identity: Option<String>, error: RecordError) -> Self {
        Self {
            row,
            identity,
            reason: error.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedCustomer {
    pub identity: String,
    pub name: Option<String>,
    pub amount: f64,
    pub lesson_type: Option<LessonType>,
    pub weekly_frequency: Option<u32>,
}

impl From<&CustomerRecord> for UnmatchedCustomer {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            identity: record.email.clone(),
            name: record.name.clone(),
            amount: record.amount,
            lesson_type: record.lesson_type,
            weekly_frequency: record.weekly_frequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateConflict {
    pub identity: String,
    pub records_collapsed: usize,
    pub chosen: CustomerRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterExclusions {
    pub description: String,
    pub excluded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterStats {
    pub evaluated: usize,
    pub kept: usize,
    pub excluded: usize,
    pub per_filter: Vec<FilterExclusions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyChurn {
    pub month: MonthKey,
    pub active_count: usize,
    pub new_start_count: usize,
    pub churned_count: usize,
    /// `None` when the previous month had no active customers.
    pub churn_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerMovements {
    pub started: Vec<String>,
    pub churned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnTotals {
    pub total_churned: usize,
    pub unique_active_customers: usize,
    pub overall_churn_rate: Option<f64>,
    pub average_churn_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChurnAnalysisResult {
    pub monthly: Vec<MonthlyChurn>,
    pub totals: ChurnTotals,
    pub movements: BTreeMap<MonthKey, CustomerMovements>,
    pub unmatched: Vec<UnmatchedCustomer>,
    pub duplicate_conflicts: Vec<DuplicateConflict>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub month: MonthKey,
    pub revenue: f64,
    pub churned_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueRange {
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; needs at least two months.
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueTotals {
    pub total_revenue: f64,
    pub total_churned_revenue: f64,
    pub average_monthly_revenue: f64,
    pub range: Option<RevenueRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerLifetimeValue {
    pub total_revenue: f64,
    pub months: u32,
    pub average_monthly_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueBreakdown {
    pub total_revenue: f64,
    pub churned_revenue: f64,
    pub billed_months: usize,
    pub unique_customers: usize,
    pub average_monthly_price: f64,
    pub monthly: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub billing_mode: BillingMode,
    pub monthly: Vec<MonthlyRevenue>,
    pub totals: RevenueTotals,
    pub lifetime_values: BTreeMap<String, CustomerLifetimeValue>,
    pub by_lesson_type: BTreeMap<String, RevenueBreakdown>,
    pub by_duration: BTreeMap<String, RevenueBreakdown>,
    pub by_plan: BTreeMap<String, RevenueBreakdown>,
    pub by_weekly_frequency: BTreeMap<String, RevenueBreakdown>,
}

/// Churn and revenue figures for one month side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMetrics {
    pub month: MonthKey,
    pub active_count: usize,
    pub new_start_count: usize,
    pub churned_count: usize,
    pub churn_rate: Option<f64>,
    pub revenue: f64,
    pub churned_revenue: f64,
}

impl MonthlyMetrics {
    pub fn merge(churn: &MonthlyChurn, revenue: &MonthlyRevenue) -> Self {
        debug_assert_eq!(churn.month, revenue.month);
        Self {
            month: churn.month,
            active_count: churn.active_count,
            new_start_count: churn.new_start_count,
            churned_count: churn.churned_count,
            churn_rate: churn.churn_rate,
            revenue: revenue.revenue,
            churned_revenue: revenue.churned_revenue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub window: AnalysisWindow,
    pub billing_mode: BillingMode,
    pub monthly_metrics: Vec<MonthlyMetrics>,
    pub churn: ChurnAnalysisResult,
    pub revenue: RevenueSummary,
    pub skipped: Vec<SkippedRecord>,
    pub filter_stats: FilterStats,
}

impl AnalysisOutcome {
    pub fn metrics_for(&self, month: MonthKey) -> Option<&MonthlyMetrics> {
        self.monthly_metrics.iter().find(|m| m.month == month)
    }
}
