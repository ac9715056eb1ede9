use crate::core::catalog::PlanCatalog;
use crate::core::churn::{ChurnAggregator, ChurnReport};
use crate::core::dedup::DuplicateResolver;
use crate::core::expander::{resolve_window, ContractExpander, ExpandedSeries};
use crate::core::filters::FilterChain;
use crate::core::matcher::{MatchOutcome, PlanMatcher};
use crate::core::revenue::RevenueAggregator;
use crate::core::validate::{RecordOverride, RecordValidator};
use crate::domain::model::{BillingMode, MatchedCustomer, MonthKey, RawCustomerRecord};
use crate::domain::ports::{DataLoader, FilterSubject};
use crate::domain::report::{
    AnalysisOutcome, ChurnAnalysisResult, MonthlyMetrics, RevenueSummary, SkippedRecord,
};
use crate::utils::error::{AnalysisError, EmptyInputReason, Result};
use crate::utils::monitor::RunMonitor;
use chrono::NaiveDate;
use std::sync::Arc;

/// Run parameters that are not part of the catalog or the filter chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRequest {
    pub from: Option<MonthKey>,
    pub to: Option<MonthKey>,
    pub as_of: Option<NaiveDate>,
    pub billing_mode: BillingMode,
    pub overrides: Vec<RecordOverride>,
}

/// Drives one analysis: load, validate, dedupe, match and filter, expand,
/// then aggregate churn and revenue side by side.
pub struct AnalysisEngine<L: DataLoader> {
    loader: L,
    catalog: PlanCatalog,
    filters: FilterChain,
    request: AnalysisRequest,
    monitor: RunMonitor,
}

impl<L: DataLoader> AnalysisEngine<L> {
    pub fn new(
        loader: L,
        catalog: PlanCatalog,
        filters: FilterChain,
        request: AnalysisRequest,
    ) -> Self {
        Self::new_with_monitoring(loader, catalog, filters, request, false)
    }

    pub fn new_with_monitoring(
        loader: L,
        catalog: PlanCatalog,
        filters: FilterChain,
        request: AnalysisRequest,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            loader,
            catalog,
            filters,
            request,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    pub async fn run(&self) -> Result<AnalysisOutcome> {
        tracing::info!("🚀 Starting churn analysis");

        if self.catalog.is_empty() {
            return Err(AnalysisError::empty(EmptyInputReason::EmptyCatalog));
        }

        tracing::info!("📥 Loading records from {}", self.loader.describe());
        let raw = self.loader.load_records().await?;
        tracing::info!("📥 Loaded {} raw records", raw.len());
        self.monitor.log_phase("load");

        let outcome = self.analyze(raw).await?;
        self.monitor.log_final_stats();
        Ok(outcome)
    }

    /// Everything after loading. Exposed so callers holding records in memory
    /// can skip the loader.
    pub async fn analyze(&self, raw: Vec<RawCustomerRecord>) -> Result<AnalysisOutcome> {
        if self.catalog.is_empty() {
            return Err(AnalysisError::empty(EmptyInputReason::EmptyCatalog));
        }

        let validator = RecordValidator::new(self.request.as_of, self.request.overrides.clone());
        let (valid, mut skipped) = validator.validate_batch(&raw);
        tracing::info!(
            "🔍 Validated {} records, skipped {}",
            valid.len(),
            skipped.len()
        );
        if valid.is_empty() {
            return Err(AnalysisError::empty(EmptyInputReason::NoValidRecords));
        }
        self.monitor.log_phase("validate");

        let resolution = DuplicateResolver::new().resolve(valid);
        if !resolution.conflicts.is_empty() {
            tracing::info!(
                "🧹 Collapsed duplicates for {} customers",
                resolution.conflicts.len()
            );
        }

        let matcher = PlanMatcher::new(&self.catalog);
        let mut tracker = self.filters.tracker();
        let mut matched: Vec<MatchedCustomer> = Vec::new();
        let mut unmatched = Vec::new();
        let mut kept = Vec::new();

        for record in &resolution.records {
            let outcome = matcher.match_record(record);
            let subject = FilterSubject {
                record,
                plan: outcome.matched().map(|m| m.plan.as_ref()),
            };
            if !tracker.keep(&subject) {
                continue;
            }
            kept.push(record);
            match outcome {
                MatchOutcome::Matched(customer) => matched.push(customer),
                MatchOutcome::Unmatched(customer) => unmatched.push(customer),
            }
        }
        let filter_stats = tracker.finish();
        tracing::info!(
            "🧮 Matched {} customers, {} unmatched, {} filtered out",
            matched.len(),
            unmatched.len(),
            filter_stats.excluded
        );
        self.monitor.log_phase("match");

        if matched.is_empty() {
            tracing::warn!("⚠️ No customer matched a plan after filtering, metrics will be zero");
        }

        // 全部被過濾時，以所有有效紀錄推算分析區間
        let observed = if kept.is_empty() {
            resolution.records.iter().collect::<Vec<_>>()
        } else {
            kept
        };
        let as_of_month = self.request.as_of.map(MonthKey::from_date);
        let window = resolve_window(self.request.from, self.request.to, as_of_month, observed)
            .ok_or_else(|| AnalysisError::ProcessingError {
                message: format!(
                    "analysis window is empty ({:?}..={:?})",
                    self.request.from, self.request.to
                ),
            })?;
        tracing::info!("📅 Analysis window {}..={}", window.from, window.to);

        let (series, failures) = ContractExpander::new(window).expand_all(matched);
        skipped.extend(failures.into_iter().map(|failure| {
            SkippedRecord::new(
                None,
                Some(failure.customer.identity().to_string()),
                failure.error,
            )
        }));
        self.monitor.log_phase("expand");

        let series = Arc::new(series);
        let billing_mode = self.request.billing_mode;
        let (churn, revenue) = aggregate(series.clone(), billing_mode).await?;
        self.monitor.log_phase("aggregate");

        let monthly_metrics = churn
            .monthly
            .iter()
            .zip(&revenue.monthly)
            .map(|(c, r)| MonthlyMetrics::merge(c, r))
            .collect();

        tracing::info!(
            "✅ Analysis complete: {} customers churned, revenue {:.2}",
            churn.totals.total_churned,
            revenue.totals.total_revenue
        );

        Ok(AnalysisOutcome {
            window,
            billing_mode,
            monthly_metrics,
            churn: ChurnAnalysisResult {
                monthly: churn.monthly,
                totals: churn.totals,
                movements: churn.movements,
                unmatched,
                duplicate_conflicts: resolution.conflicts,
            },
            revenue,
            skipped,
            filter_stats,
        })
    }
}

/// Runs both aggregators on blocking worker threads over the same snapshot.
pub async fn aggregate(
    series: Arc<ExpandedSeries>,
    billing_mode: BillingMode,
) -> Result<(ChurnReport, RevenueSummary)> {
    let churn_input = Arc::clone(&series);
    let churn_task =
        tokio::task::spawn_blocking(move || ChurnAggregator::new().aggregate(&churn_input));
    let revenue_task = tokio::task::spawn_blocking(move || {
        RevenueAggregator::new(billing_mode).aggregate(&series)
    });

    let (churn, revenue) = tokio::try_join!(churn_task, revenue_task)?;
    Ok((churn, revenue))
}
