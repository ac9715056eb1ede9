use crate::domain::model::{LessonPlan, LessonType};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_cost_options, validate_non_empty_string, validate_positive_number, Validate,
};
use std::sync::Arc;

/// Immutable, ordered set of plans. Order is the match tie-break.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<Arc<LessonPlan>>,
}

impl PlanCatalog {
    /// Builds a catalog, rejecting malformed plan definitions.
    ///
    /// An empty catalog is accepted here; the engine refuses to run with one.
    pub fn new(plans: Vec<LessonPlan>) -> Result<Self> {
        let catalog = Self {
            plans: plans.into_iter().map(Arc::new).collect(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Arc<LessonPlan>> {
        self.plans.iter()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn by_label(&self, label: &str) -> Option<&Arc<LessonPlan>> {
        self.plans.iter().find(|plan| plan.label == label)
    }

    /// The lesson-business price list.
    pub fn default_catalog() -> Self {
        let plan = |label: &str, lesson_type, duration_months, weekly_frequency, costs: &[f64]| {
            Arc::new(LessonPlan {
                label: label.to_string(),
                lesson_type,
                duration_months,
                weekly_frequency,
                cost_options: costs.to_vec(),
            })
        };

        use LessonType::{Group, Private};
        Self {
            plans: vec![
                plan("Private-Month", Private, 1, 1, &[129.0, 150.0, 160.0, 180.0, 220.0]),
                plan("Private-Month_Twice_week", Private, 1, 2, &[110.0]),
                plan("Private_3_Months", Private, 3, 1, &[504.0, 540.0]),
                plan("Private_6_Months", Private, 6, 1, &[1080.0, 840.0, 960.0]),
                plan("Private_6_Months_Twice_week", Private, 6, 2, &[2180.0]),
                plan("Private-Year", Private, 12, 1, &[1920.0]),
                plan(
                    "Group-Month",
                    Group,
                    1,
                    1,
                    &[60.0, 80.0, 160.0, 240.0, 129.0, 120.0, 149.0],
                ),
                plan("Group-Month_Twice_week", Group, 1, 2, &[99.0]),
                plan("Group_6_Months", Group, 6, 1, &[420.0, 225.0]),
                plan("Group_6_Months_Twice_week", Group, 6, 2, &[534.0]),
            ],
        }
    }
}

impl Validate for PlanCatalog {
    fn validate(&self) -> Result<()> {
        for (index, plan) in self.plans.iter().enumerate() {
            let field = |name: &str| format!("plans[{}].{}", index, name);
            validate_non_empty_string(&field("label"), &plan.label)?;
            validate_positive_number(&field("duration_months"), plan.duration_months, 1)?;
            validate_positive_number(&field("weekly_frequency"), plan.weekly_frequency, 1)?;
            validate_cost_options(&field("cost_options"), &plan.cost_options)?;
        }
        Ok(())
    }
}
