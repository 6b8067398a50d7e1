use std::collections::{BTreeSet, VecDeque};

use possum::entities::resource;
use possum::storage;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Every role `member` holds, directly or through other memberships.
#[allow(dead_code)]
pub async fn transitive_roles(db: &DatabaseConnection, member: &str) -> BTreeSet<String> {
    let mut held = BTreeSet::new();
    let mut queue = VecDeque::from([member.to_string()]);

    while let Some(current) = queue.pop_front() {
        let memberships = storage::memberships_of_member(db, &current)
            .await
            .expect("Failed to list memberships");
        for m in memberships {
            if held.insert(m.role_id.clone()) {
                queue.push_back(m.role_id);
            }
        }
    }
    held
}

/// `(privilege, role_id)` pairs granted on a resource, sorted
#[allow(dead_code)]
pub async fn permission_pairs(db: &DatabaseConnection, resource_id: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = storage::permissions_on(db, resource_id)
        .await
        .expect("Failed to list permissions")
        .into_iter()
        .map(|p| (p.privilege, p.role_id))
        .collect();
    pairs.sort();
    pairs
}

#[allow(dead_code)]
pub async fn role_ids(db: &DatabaseConnection) -> Vec<String> {
    storage::list_roles(db)
        .await
        .expect("Failed to list roles")
        .into_iter()
        .map(|r| r.id)
        .collect()
}

/// Ids of resources starting with `prefix`, sorted
#[allow(dead_code)]
pub async fn resource_ids_under(db: &DatabaseConnection, prefix: &str) -> Vec<String> {
    resource::Entity::find()
        .filter(resource::Column::Id.starts_with(prefix))
        .order_by_asc(resource::Column::Id)
        .all(db)
        .await
        .expect("Failed to list resources")
        .into_iter()
        .map(|r| r.id)
        .filter(|id| id.starts_with(prefix))
        .collect()
}
