use crate::core::catalog::PlanCatalog;
use crate::domain::model::{CustomerRecord, MatchedCustomer};
use crate::domain::report::UnmatchedCustomer;

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(MatchedCustomer),
    Unmatched(UnmatchedCustomer),
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&MatchedCustomer> {
        match self {
            MatchOutcome::Matched(customer) => Some(customer),
            MatchOutcome::Unmatched(_) => None,
        }
    }
}

/// Maps a paid amount (plus declared type/frequency) onto a catalog plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanMatcher<'a> {
    catalog: &'a PlanCatalog,
}

impl<'a> PlanMatcher<'a> {
    pub fn new(catalog: &'a PlanCatalog) -> Self {
        Self { catalog }
    }

    /// Declared frequency and lesson type narrow the candidates only when the
    /// record carries them. Several survivors resolve to the first in catalog
    /// order.
    pub fn match_record(&self, record: &CustomerRecord) -> MatchOutcome {
        let mut survivors = self
            .catalog
            .plans()
            .filter(|plan| {
                record
                    .weekly_frequency
                    .map_or(true, |freq| plan.weekly_frequency == freq)
            })
            .filter(|plan| record.lesson_type.map_or(true, |kind| plan.lesson_type == kind))
            .filter_map(|plan| plan.matching_cost(record.amount).map(|cost| (plan, cost)));

        match survivors.next() {
            Some((plan, cost_option)) => {
                let ambiguous = survivors.count();
                if ambiguous > 0 {
                    tracing::debug!(
                        "Amount {} for {} fits {} more plan(s), using '{}'",
                        record.amount,
                        record.identity(),
                        ambiguous,
                        plan.label
                    );
                }
                MatchOutcome::Matched(MatchedCustomer {
                    record: record.clone(),
                    plan: plan.clone(),
                    cost_option,
                })
            }
            None => {
                tracing::warn!(
                    "⚠️ No plan matches amount {} for {}",
                    record.amount,
                    record.identity()
                );
                MatchOutcome::Unmatched(UnmatchedCustomer::from(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LessonType, AMOUNT_EPSILON};
    use chrono::NaiveDate;

    fn record(amount: f64) -> CustomerRecord {
        CustomerRecord {
            email: "maya@example.com".to_string(),
            name: None,
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            canceled_date: None,
            amount,
            lesson_type: None,
            weekly_frequency: None,
            status: None,
        }
    }

    #[test]
    fn test_unique_amount_matches() {
        let catalog = PlanCatalog::default_catalog();
        let outcome = PlanMatcher::new(&catalog).match_record(&record(540.0));
        let matched = outcome.matched().unwrap();
        assert_eq!(matched.plan.label, "Private_3_Months");
        assert!((matched.monthly_price() * 3.0 - 540.0).abs() <= AMOUNT_EPSILON);
    }

    #[test]
    fn test_shared_amount_uses_catalog_order() {
        let catalog = PlanCatalog::default_catalog();
        // 129 is listed under Private-Month and Group-Month
        let outcome = PlanMatcher::new(&catalog).match_record(&record(129.0));
        assert_eq!(outcome.matched().unwrap().plan.label, "Private-Month");
    }

    #[test]
    fn test_declared_type_narrows_candidates() {
        let catalog = PlanCatalog::default_catalog();
        let mut group = record(129.0);
        group.lesson_type = Some(LessonType::Group);
        let outcome = PlanMatcher::new(&catalog).match_record(&group);
        assert_eq!(outcome.matched().unwrap().plan.label, "Group-Month");
    }

    #[test]
    fn test_declared_frequency_narrows_candidates() {
        let catalog = PlanCatalog::default_catalog();
        let mut twice = record(110.0);
        twice.weekly_frequency = Some(1);
        assert!(PlanMatcher::new(&catalog).match_record(&twice).matched().is_none());

        twice.weekly_frequency = Some(2);
        let outcome = PlanMatcher::new(&catalog).match_record(&twice);
        assert_eq!(outcome.matched().unwrap().plan.label, "Private-Month_Twice_week");
    }

    #[test]
    fn test_unknown_amount_is_unmatched() {
        let catalog = PlanCatalog::default_catalog();
        match PlanMatcher::new(&catalog).match_record(&record(37.0)) {
            MatchOutcome::Unmatched(unmatched) => {
                assert_eq!(unmatched.identity, "maya@example.com");
                assert_eq!(unmatched.amount, 37.0);
            }
            MatchOutcome::Matched(m) => panic!("unexpected match {}", m.plan.label),
        }
    }

    #[test]
    fn test_rounding_noise_still_matches() {
        let catalog = PlanCatalog::default_catalog();
        let outcome = PlanMatcher::new(&catalog).match_record(&record(149.004));
        assert_eq!(outcome.matched().unwrap().plan.label, "Group-Month");
    }
}
