use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Tolerance used when comparing a paid amount with a catalog cost option.
pub const AMOUNT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LessonType {
    Private,
    Group,
}

impl FromStr for LessonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(LessonType::Private),
            "group" => Ok(LessonType::Group),
            other => Err(format!("unknown lesson type '{}'", other)),
        }
    }
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonType::Private => f.write_str("Private"),
            LessonType::Group => f.write_str("Group"),
        }
    }
}

/// Whether the churn month's fee counts as earned revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum BillingMode {
    #[default]
    InAdvance,
    InArrears,
}

impl BillingMode {
    pub fn bills_churn_month(self) -> bool {
        matches!(self, BillingMode::InAdvance)
    }
}

impl FromStr for BillingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "in_advance" => Ok(BillingMode::InAdvance),
            "in_arrears" => Ok(BillingMode::InArrears),
            other => Err(format!("unknown billing mode '{}'", other)),
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingMode::InAdvance => f.write_str("in_advance"),
            BillingMode::InArrears => f.write_str("in_arrears"),
        }
    }
}

/// A calendar year-month. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    /// Number of months in `self..=end`; zero when `end` precedes `self`.
    pub fn months_through(self, end: MonthKey) -> u32 {
        let span = end.ordinal() - self.ordinal() + 1;
        u32::try_from(span.max(0)).unwrap_or(u32::MAX)
    }

    /// Inclusive range `from..=to`, empty when `to < from`.
    pub fn range(from: MonthKey, to: MonthKey) -> MonthRange {
        MonthRange {
            next: Some(from).filter(|start| *start <= to),
            last: to,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("'{}' is not a YYYY-MM month", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("'{}' has an invalid year", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("'{}' has an invalid month", s))?;
        MonthKey::new(year, month).ok_or_else(|| format!("'{}' has a month outside 1-12", s))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct MonthRange {
    next: Option<MonthKey>,
    last: MonthKey,
}

impl Iterator for MonthRange {
    type Item = MonthKey;

    fn next(&mut self) -> Option<MonthKey> {
        let current = self.next?;
        let last = self.last;
        self.next = Some(current.succ()).filter(|m| *m <= last);
        Some(current)
    }
}

/// Inclusive month window the metrics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub from: MonthKey,
    pub to: MonthKey,
}

impl AnalysisWindow {
    pub fn new(from: MonthKey, to: MonthKey) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    pub fn contains(&self, month: MonthKey) -> bool {
        self.from <= month && month <= self.to
    }

    pub fn months(&self) -> MonthRange {
        MonthKey::range(self.from, self.to)
    }
}

/// A customer row exactly as the loader delivered it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCustomerRecord {
    #[serde(alias = "Customer Email", alias = "Email")]
    pub email: Option<String>,
    #[serde(alias = "Customer Name", alias = "Name")]
    pub name: Option<String>,
    #[serde(alias = "Start Date (UTC)", alias = "Start Date")]
    pub start_date: Option<String>,
    #[serde(alias = "Canceled At (UTC)", alias = "Canceled At", alias = "canceled_at")]
    pub canceled_date: Option<String>,
    #[serde(alias = "Amount")]
    pub amount: Option<String>,
    #[serde(alias = "Lesson Type")]
    pub lesson_type: Option<String>,
    #[serde(alias = "Times Per Week", alias = "times_per_week")]
    pub weekly_frequency: Option<String>,
    #[serde(alias = "Status")]
    pub status: Option<String>,
}

/// A validated customer record. Email and name are normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub email: String,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub canceled_date: Option<NaiveDate>,
    pub amount: f64,
    pub lesson_type: Option<LessonType>,
    pub weekly_frequency: Option<u32>,
    pub status: Option<String>,
}

impl CustomerRecord {
    pub fn identity(&self) -> &str {
        &self.email
    }

    pub fn start_month(&self) -> MonthKey {
        MonthKey::from_date(self.start_date)
    }

    pub fn cancel_month(&self) -> Option<MonthKey> {
        self.canceled_date.map(MonthKey::from_date)
    }

    /// Count of populated optional fields.
    pub fn completeness(&self) -> usize {
        [
            self.name.is_some(),
            self.canceled_date.is_some(),
            self.lesson_type.is_some(),
            self.weekly_frequency.is_some(),
            self.status.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

pub fn normalize_identity(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub label: String,
    pub lesson_type: LessonType,
    pub duration_months: u32,
    pub weekly_frequency: u32,
    pub cost_options: Vec<f64>,
}

impl LessonPlan {
    /// The cost option equal to `amount` within [`AMOUNT_EPSILON`].
    pub fn matching_cost(&self, amount: f64) -> Option<f64> {
        self.cost_options
            .iter()
            .copied()
            .find(|cost| (cost - amount).abs() <= AMOUNT_EPSILON)
    }

    pub fn monthly_price(&self, cost_option: f64) -> f64 {
        cost_option / f64::from(self.duration_months)
    }

    pub fn duration_bucket(&self) -> String {
        format!("{}_months", self.duration_months)
    }

    pub fn frequency_bucket(&self) -> String {
        format!("{}_per_week", self.weekly_frequency)
    }
}

/// A customer bound to exactly one catalog plan.
#[derive(Debug, Clone)]
pub struct MatchedCustomer {
    pub record: CustomerRecord,
    pub plan: Arc<LessonPlan>,
    pub cost_option: f64,
}

impl MatchedCustomer {
    pub fn identity(&self) -> &str {
        self.record.identity()
    }

    pub fn monthly_price(&self) -> f64 {
        self.plan.monthly_price(self.cost_option)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyActivityRecord {
    pub customer: String,
    pub month: MonthKey,
    pub is_active: bool,
    pub is_churn_month: bool,
    pub attributed_revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_month_key_successor_wraps_year() {
        assert_eq!(month("2023-12").succ(), month("2024-01"));
        assert_eq!(month("2024-01").pred(), month("2023-12"));
        assert!(month("2023-12") < month("2024-01"));
    }

    #[test]
    fn test_month_range_is_inclusive() {
        let months: Vec<String> = MonthKey::range(month("2023-11"), month("2024-02"))
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(MonthKey::range(month("2024-02"), month("2024-01")).count(), 0);
        assert_eq!(month("2023-11").months_through(month("2024-02")), 4);
        assert_eq!(month("2024-02").months_through(month("2023-11")), 0);
    }

    #[test]
    fn test_month_key_rejects_bad_input() {
        assert!("2023-13".parse::<MonthKey>().is_err());
        assert!("202301".parse::<MonthKey>().is_err());
        assert!(MonthKey::new(2023, 0).is_none());
    }

    #[test]
    fn test_month_key_serializes_as_string() {
        let json = serde_json::to_string(&month("2023-04")).unwrap();
        assert_eq!(json, "\"2023-04\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month("2023-04"));
    }

    #[test]
    fn test_plan_matches_within_epsilon() {
        let plan = LessonPlan {
            label: "Private_3_Months".to_string(),
            lesson_type: LessonType::Private,
            duration_months: 3,
            weekly_frequency: 1,
            cost_options: vec![504.0, 540.0],
        };
        assert_eq!(plan.matching_cost(540.004), Some(540.0));
        assert_eq!(plan.matching_cost(541.0), None);
        assert!((plan.monthly_price(504.0) * 3.0 - 504.0).abs() <= AMOUNT_EPSILON);
    }

    #[test]
    fn test_billing_mode_parsing() {
        assert_eq!("in-arrears".parse::<BillingMode>().unwrap(), BillingMode::InArrears);
        assert_eq!("IN_ADVANCE".parse::<BillingMode>().unwrap(), BillingMode::InAdvance);
        assert!("monthly".parse::<BillingMode>().is_err());
    }
}
