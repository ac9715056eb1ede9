use crate::domain::model::LessonType;
use crate::domain::ports::{Filter, FilterSubject};
use crate::domain::report::{FilterExclusions, FilterStats};
use regex::Regex;
use std::collections::HashSet;

/// Keeps paid amounts inside `[min, max]`.
#[derive(Debug, Clone)]
pub struct AmountRangeFilter {
    min: f64,
    max: f64,
}

impl AmountRangeFilter {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Filter for AmountRangeFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        (self.min..=self.max).contains(&subject.record.amount)
    }

    fn describe(&self) -> String {
        format!("Only include amounts between {} and {}", self.min, self.max)
    }
}

/// Keeps matched plans whose duration lies in `[min_months, max_months]`.
#[derive(Debug, Clone)]
pub struct DurationFilter {
    min_months: u32,
    max_months: u32,
}

impl DurationFilter {
    pub fn new(min_months: u32, max_months: u32) -> Self {
        Self {
            min_months,
            max_months,
        }
    }
}

impl Filter for DurationFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        subject
            .plan
            .is_some_and(|plan| (self.min_months..=self.max_months).contains(&plan.duration_months))
    }

    fn describe(&self) -> String {
        format!(
            "Only include {}-{} month subscriptions",
            self.min_months, self.max_months
        )
    }
}

#[derive(Debug, Clone)]
pub struct LessonTypeFilter {
    lesson_type: LessonType,
}

impl LessonTypeFilter {
    pub fn new(lesson_type: LessonType) -> Self {
        Self { lesson_type }
    }
}

impl Filter for LessonTypeFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        subject
            .plan
            .is_some_and(|plan| plan.lesson_type == self.lesson_type)
    }

    fn describe(&self) -> String {
        format!("Only include {} lessons", self.lesson_type)
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyFrequencyFilter {
    times_per_week: u32,
}

impl WeeklyFrequencyFilter {
    pub fn new(times_per_week: u32) -> Self {
        Self { times_per_week }
    }
}

impl Filter for WeeklyFrequencyFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        subject
            .plan
            .is_some_and(|plan| plan.weekly_frequency == self.times_per_week)
    }

    fn describe(&self) -> String {
        format!("Only include {}x per week lessons", self.times_per_week)
    }
}

/// Drops canceled subscriptions that lasted less than `min_days`.
#[derive(Debug, Clone)]
pub struct ShortPeriodFilter {
    min_days: i64,
}

impl ShortPeriodFilter {
    pub const DEFAULT_MIN_DAYS: i64 = 30;

    pub fn new(min_days: i64) -> Self {
        Self { min_days }
    }
}

impl Default for ShortPeriodFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_DAYS)
    }
}

impl Filter for ShortPeriodFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        let record = subject.record;
        match record.canceled_date {
            Some(canceled) => (canceled - record.start_date).num_days() >= self.min_days,
            None => true,
        }
    }

    fn describe(&self) -> String {
        format!("Exclude subscriptions shorter than {} days", self.min_days)
    }
}

#[derive(Debug, Clone)]
pub struct StatusFilter {
    excluded: HashSet<String>,
}

impl StatusFilter {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: statuses
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::new(["trialing", "incomplete_expired"])
    }
}

impl Filter for StatusFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        subject
            .record
            .status
            .as_deref()
            .map_or(true, |status| !self.excluded.contains(status))
    }

    fn describe(&self) -> String {
        let mut statuses: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
        statuses.sort_unstable();
        format!("Exclude statuses: {}", statuses.join(", "))
    }
}

/// Drops internal test accounts: email or name matching `pattern`, unless
/// whitelisted; `blocked` emails are always dropped.
#[derive(Debug, Clone)]
pub struct TestInstanceFilter {
    pattern: Regex,
    exceptions: HashSet<String>,
    blocked: HashSet<String>,
}

impl TestInstanceFilter {
    pub fn new(
        pattern: &str,
        exceptions: &[String],
        blocked: &[String],
    ) -> Result<Self, regex::Error> {
        let normalize = |emails: &[String]| {
            emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect::<HashSet<_>>()
        };
        Ok(Self {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            exceptions: normalize(exceptions),
            blocked: normalize(blocked),
        })
    }
}

impl Filter for TestInstanceFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        let email = subject.record.email.as_str();
        if self.blocked.contains(email) {
            return false;
        }
        if self.exceptions.contains(email) {
            return true;
        }
        let name = subject.record.name.as_deref().unwrap_or("");
        !(self.pattern.is_match(email) || self.pattern.is_match(name))
    }

    fn describe(&self) -> String {
        format!("Exclude test instances ({})", self.pattern.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ExcludeCustomersFilter {
    emails: HashSet<String>,
}

impl ExcludeCustomersFilter {
    pub fn new(emails: &[String]) -> Self {
        Self {
            emails: emails.iter().map(|e| e.trim().to_lowercase()).collect(),
        }
    }
}

impl Filter for ExcludeCustomersFilter {
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        !self.emails.contains(&subject.record.email)
    }

    fn describe(&self) -> String {
        format!("Exclude {} listed customers", self.emails.len())
    }
}

/// Wraps an arbitrary caller predicate.
pub struct PredicateFilter<F> {
    name: String,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: Fn(&FilterSubject<'_>) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> Filter for PredicateFilter<F>
where
    F: Fn(&FilterSubject<'_>) -> bool + Send + Sync,
{
    fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        (self.predicate)(subject)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Ordered conjunction of filters with short-circuit evaluation.
///
/// Exclusions are attributed to the first filter that rejects a customer.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn active_filters(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.describe()).collect()
    }

    /// Index of the first rejecting filter, `None` when every filter keeps.
    pub fn first_rejection(&self, subject: &FilterSubject<'_>) -> Option<usize> {
        self.filters.iter().position(|f| !f.evaluate(subject))
    }

    pub fn evaluate(&self, subject: &FilterSubject<'_>) -> bool {
        self.first_rejection(subject).is_none()
    }

    pub fn tracker(&self) -> FilterTracker<'_> {
        FilterTracker {
            chain: self,
            excluded: vec![0; self.filters.len()],
            evaluated: 0,
        }
    }
}

/// Evaluates subjects against a chain while counting exclusions.
pub struct FilterTracker<'a> {
    chain: &'a FilterChain,
    excluded: Vec<usize>,
    evaluated: usize,
}

impl FilterTracker<'_> {
    pub fn keep(&mut self, subject: &FilterSubject<'_>) -> bool {
        self.evaluated += 1;
        match self.chain.first_rejection(subject) {
            Some(index) => {
                self.excluded[index] += 1;
                tracing::debug!(
                    "Filtered out {}: {}",
                    subject.record.identity(),
                    self.chain.filters[index].describe()
                );
                false
            }
            None => true,
        }
    }

    pub fn finish(self) -> FilterStats {
        let excluded: usize = self.excluded.iter().sum();
        FilterStats {
            evaluated: self.evaluated,
            kept: self.evaluated - excluded,
            excluded,
            per_filter: self
                .chain
                .filters
                .iter()
                .zip(self.excluded)
                .map(|(filter, excluded)| FilterExclusions {
                    description: filter.describe(),
                    excluded,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::PlanCatalog;
    use crate::domain::model::{CustomerRecord, LessonPlan};
    use chrono::NaiveDate;

    fn record(email: &str, amount: f64, cancel: Option<(i32, u32, u32)>) -> CustomerRecord {
        CustomerRecord {
            email: email.to_string(),
            name: Some("lior".to_string()),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            canceled_date: cancel.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            amount,
            lesson_type: None,
            weekly_frequency: None,
            status: None,
        }
    }

    #[test]
    fn test_amount_excludes_regardless_of_duration() {
        let catalog = PlanCatalog::default_catalog();
        let six_months: &LessonPlan = catalog.by_label("Private_6_Months").unwrap();
        let chain = FilterChain::new()
            .add_filter(AmountRangeFilter::new(100.0, 1000.0))
            .add_filter(DurationFilter::new(3, 12));

        let cheap = record("a@example.com", 50.0, None);
        let subject = FilterSubject {
            record: &cheap,
            plan: Some(six_months),
        };
        assert!(!chain.evaluate(&subject));
        assert_eq!(chain.first_rejection(&subject), Some(0));

        let fine = record("b@example.com", 840.0, None);
        assert!(chain.evaluate(&FilterSubject {
            record: &fine,
            plan: Some(six_months),
        }));
    }

    #[test]
    fn test_plan_filters_exclude_unmatched() {
        let r = record("a@example.com", 37.0, None);
        let subject = FilterSubject {
            record: &r,
            plan: None,
        };
        assert!(!DurationFilter::new(1, 12).evaluate(&subject));
        assert!(!LessonTypeFilter::new(LessonType::Private).evaluate(&subject));
        assert!(!WeeklyFrequencyFilter::new(1).evaluate(&subject));
    }

    #[test]
    fn test_short_period_filter() {
        let filter = ShortPeriodFilter::default();
        let short = record("a@example.com", 150.0, Some((2023, 1, 20)));
        let long = record("b@example.com", 150.0, Some((2023, 3, 1)));
        let open = record("c@example.com", 150.0, None);
        let keep = |r: &CustomerRecord| filter.evaluate(&FilterSubject { record: r, plan: None });
        assert!(!keep(&short));
        assert!(keep(&long));
        assert!(keep(&open));
    }

    #[test]
    fn test_test_instance_filter() {
        let filter = TestInstanceFilter::new(
            "shir",
            &["kshirjarohannaik@gmail.com".to_string()],
            &["janecoppee@gmail.com".to_string()],
        )
        .unwrap();
        let keep = |email: &str| {
            let r = record(email, 150.0, None);
            filter.evaluate(&FilterSubject {
                record: &r,
                plan: None,
            })
        };
        assert!(!keep("shir.tester@gmail.com"));
        assert!(keep("kshirjarohannaik@gmail.com"));
        assert!(!keep("janecoppee@gmail.com"));
        assert!(keep("someone@gmail.com"));
    }

    #[test]
    fn test_status_filter_keeps_missing_status() {
        let filter = StatusFilter::default();
        let mut r = record("a@example.com", 150.0, None);
        assert!(filter.evaluate(&FilterSubject { record: &r, plan: None }));
        r.status = Some("trialing".to_string());
        assert!(!filter.evaluate(&FilterSubject { record: &r, plan: None }));
    }

    #[test]
    fn test_tracker_attributes_first_rejection() {
        let chain = FilterChain::new()
            .add_filter(AmountRangeFilter::new(100.0, 1000.0))
            .add_filter(PredicateFilter::new("no example.org", |s: &FilterSubject<'_>| {
                !s.record.email.ends_with("@example.org")
            }));

        let rows = vec![
            record("a@example.com", 50.0, None),
            record("b@example.org", 50.0, None),
            record("c@example.org", 150.0, None),
            record("d@example.com", 150.0, None),
        ];

        let mut tracker = chain.tracker();
        let kept: Vec<&str> = rows
            .iter()
            .filter(|r| tracker.keep(&FilterSubject { record: r, plan: None }))
            .map(|r| r.email.as_str())
            .collect();
        let stats = tracker.finish();

        assert_eq!(kept, vec!["d@example.com"]);
        assert_eq!(stats.evaluated, 4);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.per_filter[0].excluded, 2);
        assert_eq!(stats.per_filter[1].excluded, 1);
        assert_eq!(stats.per_filter[1].description, "no example.org");
    }
}
