use std::collections::HashMap;
use tracing::debug;

use crate::analyzers::types::{DirectionalCount, EntityTotal, RoleColumns};
use crate::records::Record;

/// Sums each role's measure per entity.
///
/// Returns one [`DirectionalCount`] per (entity, role) in first-seen order,
/// role by role. Records with a blank entity label do not contribute.
pub fn group_by_role(
    records: &[&Record],
    roles: &[RoleColumns],
    category_column: Option<&str>,
) -> Vec<DirectionalCount> {
    let mut counts = Vec::new();

    for role in roles {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut grouped: Vec<DirectionalCount> = Vec::new();
        let mut unlabeled = 0usize;

        for record in records {
            let Some(entity) = record.label(&role.entity_column) else {
                unlabeled += 1;
                continue;
            };

            let slot = *index.entry(entity).or_insert_with(|| {
                grouped.push(DirectionalCount {
                    entity: entity.to_string(),
                    role: role.role,
                    total: 0,
                    categories: Vec::new(),
                });
                grouped.len() - 1
            });

            let count = &mut grouped[slot];
            count.total += record.count(&role.measure_column);
            if let Some(category) = category_column.and_then(|c| record.label(c)) {
                if !count.categories.iter().any(|c| c == category) {
                    count.categories.push(category.to_string());
                }
            }
        }

        if unlabeled > 0 {
            debug!(
                role = ?role.role,
                column = %role.entity_column,
                unlabeled,
                "Records without an entity skipped"
            );
        }
        counts.extend(grouped);
    }

    counts
}

/// Outer-merges directional counts on the entity label.
///
/// An entity seen in only one role keeps 0 for the others. Output order is
/// the order in which entities first appear in `counts`.
pub fn merge_roles(counts: Vec<DirectionalCount>) -> Vec<EntityTotal> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut totals: Vec<EntityTotal> = Vec::new();

    for count in counts {
        let slot = match index.get(&count.entity) {
            Some(&slot) => slot,
            None => {
                index.insert(count.entity.clone(), totals.len());
                totals.push(EntityTotal::empty(&count.entity));
                totals.len() - 1
            }
        };

        let total = &mut totals[slot];
        total.add(count.role, count.total);
        for category in count.categories {
            if !total.categories.contains(&category) {
                total.categories.push(category);
            }
        }
    }

    totals
}

/// Groups filtered records into one [`EntityTotal`] per observed entity.
pub fn aggregate(
    records: &[&Record],
    roles: &[RoleColumns],
    category_column: Option<&str>,
) -> Vec<EntityTotal> {
    let totals = merge_roles(group_by_role(records, roles, category_column));
    debug!(
        records = records.len(),
        entities = totals.len(),
        "Records aggregated"
    );
    totals
}
