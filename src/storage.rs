use std::collections::HashSet;

use crate::entities::{annotation, permission, resource, role, role_membership, secret};
use crate::errors::PolicyError;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, PolicyError> {
    let mut options = ConnectOptions::new(cfg.url.clone());
    options.sqlx_logging(cfg.log_statements);
    let db = Database::connect(options).await?;
    Ok(db)
}

/// Surface unique-constraint violations as `DuplicateEntity`; everything else
/// is a persistence failure.
fn insert_error(id: &str, err: DbErr) -> PolicyError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => PolicyError::DuplicateEntity {
            id: id.to_string(),
        },
        _ => PolicyError::Persistence(err),
    }
}

// Roles

pub async fn get_role<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<Option<role::Model>, PolicyError> {
    Ok(role::Entity::find_by_id(id.to_string()).one(db).await?)
}

pub async fn require_role<C: ConnectionTrait>(db: &C, id: &str) -> Result<role::Model, PolicyError> {
    get_role(db, id)
        .await?
        .ok_or_else(|| PolicyError::ReferenceNotFound { id: id.to_string() })
}

pub async fn create_role<C: ConnectionTrait>(db: &C, id: &str) -> Result<role::Model, PolicyError> {
    if get_role(db, id).await?.is_some() {
        return Err(PolicyError::DuplicateEntity { id: id.to_string() });
    }

    let role = role::ActiveModel {
        id: Set(id.to_string()),
        uidnumber: Set(None),
        gidnumber: Set(None),
        created_at: Set(Utc::now().timestamp()),
    };

    let model = role.insert(db).await.map_err(|e| insert_error(id, e))?;
    tracing::debug!(role = %id, "Created role");
    Ok(model)
}

pub async fn update_role_uidnumber<C: ConnectionTrait>(
    db: &C,
    id: &str,
    uidnumber: i64,
) -> Result<role::Model, PolicyError> {
    let mut active: role::ActiveModel = require_role(db, id).await?.into();
    active.uidnumber = Set(Some(uidnumber));
    Ok(active.update(db).await?)
}

pub async fn update_role_gidnumber<C: ConnectionTrait>(
    db: &C,
    id: &str,
    gidnumber: i64,
) -> Result<role::Model, PolicyError> {
    let mut active: role::ActiveModel = require_role(db, id).await?.into();
    active.gidnumber = Set(Some(gidnumber));
    Ok(active.update(db).await?)
}

pub async fn list_roles<C: ConnectionTrait>(db: &C) -> Result<Vec<role::Model>, PolicyError> {
    Ok(role::Entity::find()
        .order_by_asc(role::Column::Id)
        .all(db)
        .await?)
}

// Resources

pub async fn get_resource<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<Option<resource::Model>, PolicyError> {
    Ok(resource::Entity::find_by_id(id.to_string()).one(db).await?)
}

pub async fn require_resource<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<resource::Model, PolicyError> {
    get_resource(db, id)
        .await?
        .ok_or_else(|| PolicyError::ReferenceNotFound { id: id.to_string() })
}

/// Create a resource owned by `owner_id`, which must already exist.
pub async fn create_resource<C: ConnectionTrait>(
    db: &C,
    id: &str,
    owner_id: &str,
) -> Result<resource::Model, PolicyError> {
    let owner = require_role(db, owner_id).await?;

    if get_resource(db, id).await?.is_some() {
        return Err(PolicyError::DuplicateEntity { id: id.to_string() });
    }

    let resource = resource::ActiveModel {
        id: Set(id.to_string()),
        owner_id: Set(owner.id),
        created_at: Set(Utc::now().timestamp()),
    };

    let model = resource.insert(db).await.map_err(|e| insert_error(id, e))?;
    tracing::debug!(resource = %id, owner = %owner_id, "Created resource");
    Ok(model)
}

pub async fn add_annotation<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
    name: &str,
    value: &str,
) -> Result<annotation::Model, PolicyError> {
    let annotation = annotation::ActiveModel {
        id: Default::default(),
        resource_id: Set(resource_id.to_string()),
        name: Set(name.to_string()),
        value: Set(value.to_string()),
    };

    Ok(annotation.insert(db).await?)
}

/// Annotations of a resource in the order they were added.
pub async fn annotations_of<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
) -> Result<Vec<annotation::Model>, PolicyError> {
    use annotation::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::ResourceId.eq(resource_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

// Secrets

pub async fn create_secret<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
    value: &str,
) -> Result<secret::Model, PolicyError> {
    require_resource(db, resource_id).await?;

    let secret = secret::ActiveModel {
        resource_id: Set(resource_id.to_string()),
        value: Set(value.to_string()),
        created_at: Set(Utc::now().timestamp()),
    };

    secret
        .insert(db)
        .await
        .map_err(|e| insert_error(resource_id, e))
}

pub async fn get_secret<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
) -> Result<Option<secret::Model>, PolicyError> {
    Ok(secret::Entity::find_by_id(resource_id.to_string())
        .one(db)
        .await?)
}

// Memberships and permissions

/// Make `member_id` a member of `role_id`. Granting an existing pair again
/// overwrites its admin option.
pub async fn grant_role<C: ConnectionTrait>(
    db: &C,
    role_id: &str,
    member_id: &str,
    admin_option: bool,
) -> Result<(), PolicyError> {
    use role_membership::{Column, Entity};

    require_role(db, role_id).await?;
    require_role(db, member_id).await?;

    let membership = role_membership::ActiveModel {
        role_id: Set(role_id.to_string()),
        member_id: Set(member_id.to_string()),
        admin_option: Set(admin_option),
    };

    Entity::insert(membership)
        .on_conflict(
            OnConflict::columns([Column::RoleId, Column::MemberId])
                .update_column(Column::AdminOption)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::debug!(role = %role_id, member = %member_id, admin_option, "Granted role");
    Ok(())
}

/// Grant `privilege` on `resource_id` to `role_id`. An identical triple is a no-op.
pub async fn permit<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
    privilege: &str,
    role_id: &str,
) -> Result<(), PolicyError> {
    use permission::{Column, Entity};

    require_resource(db, resource_id).await?;
    require_role(db, role_id).await?;

    let permission = permission::ActiveModel {
        resource_id: Set(resource_id.to_string()),
        privilege: Set(privilege.to_string()),
        role_id: Set(role_id.to_string()),
    };

    Entity::insert(permission)
        .on_conflict(
            OnConflict::columns([Column::ResourceId, Column::Privilege, Column::RoleId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::debug!(resource = %resource_id, privilege, role = %role_id, "Permitted privilege");
    Ok(())
}

/// Roles that `role_id` has as members.
pub async fn memberships_of_role<C: ConnectionTrait>(
    db: &C,
    role_id: &str,
) -> Result<Vec<role_membership::Model>, PolicyError> {
    use role_membership::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::RoleId.eq(role_id))
        .order_by_asc(Column::MemberId)
        .all(db)
        .await?)
}

/// Roles that `member_id` is directly a member of.
pub async fn memberships_of_member<C: ConnectionTrait>(
    db: &C,
    member_id: &str,
) -> Result<Vec<role_membership::Model>, PolicyError> {
    use role_membership::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::MemberId.eq(member_id))
        .order_by_asc(Column::RoleId)
        .all(db)
        .await?)
}

pub async fn permissions_on<C: ConnectionTrait>(
    db: &C,
    resource_id: &str,
) -> Result<Vec<permission::Model>, PolicyError> {
    use permission::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::ResourceId.eq(resource_id))
        .order_by_asc(Column::Privilege)
        .order_by_asc(Column::RoleId)
        .all(db)
        .await?)
}

// Reset

/// Delete roles and every row that depends on them. With `account` set only
/// ids under `<account>:` are touched, otherwise the whole graph is cleared.
/// Returns the number of roles removed.
pub async fn reset<C: ConnectionTrait>(db: &C, account: Option<&str>) -> Result<u64, PolicyError> {
    let removed = match account {
        Some(account) => reset_account(db, account).await?,
        None => reset_all(db).await?,
    };

    tracing::info!(
        account = account.unwrap_or("*"),
        roles = removed,
        "Reset authorization graph"
    );
    Ok(removed)
}

async fn reset_all<C: ConnectionTrait>(db: &C) -> Result<u64, PolicyError> {
    // Dependents first so foreign keys hold at every step
    permission::Entity::delete_many().exec(db).await?;
    role_membership::Entity::delete_many().exec(db).await?;
    annotation::Entity::delete_many().exec(db).await?;
    secret::Entity::delete_many().exec(db).await?;
    resource::Entity::delete_many().exec(db).await?;
    Ok(role::Entity::delete_many().exec(db).await?.rows_affected)
}

async fn reset_account<C: ConnectionTrait>(db: &C, account: &str) -> Result<u64, PolicyError> {
    let prefix = format!("{account}:");

    // LIKE treats `_` and `%` as wildcards and may ignore case, so it only
    // narrows the candidates; ids are matched exactly before deleting.
    let roles: Vec<String> = role::Entity::find()
        .filter(role::Column::Id.starts_with(prefix.as_str()))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.id)
        .filter(|id| id.starts_with(&prefix))
        .collect();
    let owned_by_account: HashSet<&str> = roles.iter().map(String::as_str).collect();

    let resources: Vec<String> = resource::Entity::find()
        .filter(
            Condition::any()
                .add(resource::Column::Id.starts_with(prefix.as_str()))
                .add(resource::Column::OwnerId.is_in(roles.iter().map(String::as_str))),
        )
        .all(db)
        .await?
        .into_iter()
        .filter(|r| r.id.starts_with(&prefix) || owned_by_account.contains(r.owner_id.as_str()))
        .map(|r| r.id)
        .collect();

    let role_ids = || roles.iter().map(String::as_str);
    let resource_ids = || resources.iter().map(String::as_str);

    permission::Entity::delete_many()
        .filter(
            Condition::any()
                .add(permission::Column::ResourceId.is_in(resource_ids()))
                .add(permission::Column::RoleId.is_in(role_ids())),
        )
        .exec(db)
        .await?;
    role_membership::Entity::delete_many()
        .filter(
            Condition::any()
                .add(role_membership::Column::RoleId.is_in(role_ids()))
                .add(role_membership::Column::MemberId.is_in(role_ids())),
        )
        .exec(db)
        .await?;
    annotation::Entity::delete_many()
        .filter(annotation::Column::ResourceId.is_in(resource_ids()))
        .exec(db)
        .await?;
    secret::Entity::delete_many()
        .filter(secret::Column::ResourceId.is_in(resource_ids()))
        .exec(db)
        .await?;
    resource::Entity::delete_many()
        .filter(resource::Column::Id.is_in(resource_ids()))
        .exec(db)
        .await?;
    let result = role::Entity::delete_many()
        .filter(role::Column::Id.is_in(role_ids()))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
