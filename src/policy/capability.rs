use async_trait::async_trait;
use sea_orm::ConnectionTrait;

use crate::entities::{resource, role};
use crate::errors::PolicyError;
use crate::policy::types::{Annotation, HostFactory, ObjectId, Policy, Record, Resource, Role};
use crate::storage;

/// Statements backed by a role whose id is the statement's own id.
#[async_trait]
pub trait RoleCreatable: Sync {
    fn role_id(&self) -> &ObjectId;

    async fn create_role<C: ConnectionTrait>(&self, db: &C) -> Result<role::Model, PolicyError> {
        storage::create_role(db, &self.role_id().to_string()).await
    }

    /// `None` until `create_role` has run.
    async fn role<C: ConnectionTrait>(&self, db: &C) -> Result<Option<role::Model>, PolicyError> {
        storage::get_role(db, &self.role_id().to_string()).await
    }
}

/// Statements backed by an owned, annotated resource whose id is the statement's own id.
#[async_trait]
pub trait ResourceCreatable: Sync {
    fn resource_id(&self) -> &ObjectId;

    fn owner(&self) -> Option<&ObjectId>;

    fn annotations(&self) -> &[Annotation];

    async fn create_resource<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<resource::Model, PolicyError> {
        let id = self.resource_id().to_string();
        let owner = self.owner().ok_or_else(|| {
            PolicyError::InvalidPolicy(format!("`{id}` has no owner; resolve the policy first"))
        })?;

        let resource = storage::create_resource(db, &id, &owner.to_string()).await?;
        for annotation in self.annotations() {
            storage::add_annotation(db, &resource.id, &annotation.name, &annotation.value).await?;
        }
        Ok(resource)
    }

    /// `None` until `create_resource` has run.
    async fn resource<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<Option<resource::Model>, PolicyError> {
        storage::get_resource(db, &self.resource_id().to_string()).await
    }
}

impl RoleCreatable for Role {
    fn role_id(&self) -> &ObjectId {
        &self.id
    }
}

impl ResourceCreatable for Resource {
    fn resource_id(&self) -> &ObjectId {
        &self.id
    }

    fn owner(&self) -> Option<&ObjectId> {
        self.owner.as_ref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl RoleCreatable for Record {
    fn role_id(&self) -> &ObjectId {
        &self.id
    }
}

impl ResourceCreatable for Record {
    fn resource_id(&self) -> &ObjectId {
        &self.id
    }

    fn owner(&self) -> Option<&ObjectId> {
        self.owner.as_ref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl ResourceCreatable for HostFactory {
    fn resource_id(&self) -> &ObjectId {
        &self.resource.id
    }

    fn owner(&self) -> Option<&ObjectId> {
        self.resource.owner.as_ref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.resource.annotations
    }
}

impl RoleCreatable for Policy {
    fn role_id(&self) -> &ObjectId {
        &self.record.id
    }
}

impl ResourceCreatable for Policy {
    fn resource_id(&self) -> &ObjectId {
        &self.record.id
    }

    fn owner(&self) -> Option<&ObjectId> {
        self.record.owner.as_ref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.record.annotations
    }
}
