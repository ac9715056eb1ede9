use crate::domain::model::{normalize_identity, CustomerRecord};
use crate::domain::report::DuplicateConflict;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub records: Vec<CustomerRecord>,
    pub conflicts: Vec<DuplicateConflict>,
}

/// Collapses records sharing an identity into one canonical record.
///
/// Precedence inside a group: most populated optional fields, then earliest
/// start date, then a record that carries a cancellation date, then the
/// first one seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver;

impl DuplicateResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, records: Vec<CustomerRecord>) -> Resolution {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<CustomerRecord>> = HashMap::new();

        for record in records {
            let identity = normalize_identity(record.identity());
            groups
                .entry(identity.clone())
                .or_insert_with(|| {
                    order.push(identity);
                    Vec::new()
                })
                .push(record);
        }

        let mut resolution = Resolution::default();
        for identity in order {
            let Some(group) = groups.remove(&identity) else {
                continue;
            };
            let collapsed = group.len();
            let Some(chosen) = Self::pick_canonical(group) else {
                continue;
            };

            if collapsed > 1 {
                tracing::debug!("Collapsed {} records for {}", collapsed, identity);
                resolution.conflicts.push(DuplicateConflict {
                    identity,
                    records_collapsed: collapsed,
                    chosen: chosen.clone(),
                });
            }
            resolution.records.push(chosen);
        }

        resolution
    }

    fn pick_canonical(group: Vec<CustomerRecord>) -> Option<CustomerRecord> {
        // min_by keeps the first of equal elements, which gives first-seen as the last tie-break
        group.into_iter().min_by(Self::precedence)
    }

    fn precedence(a: &CustomerRecord, b: &CustomerRecord) -> Ordering {
        b.completeness()
            .cmp(&a.completeness())
            .then_with(|| a.start_date.cmp(&b.start_date))
            .then_with(|| b.canceled_date.is_some().cmp(&a.canceled_date.is_some()))
    }
}
