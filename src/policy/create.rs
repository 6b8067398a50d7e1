use async_trait::async_trait;
use sea_orm::ConnectionTrait;

use crate::entities::role;
use crate::errors::PolicyError;
use crate::policy::capability::{ResourceCreatable, RoleCreatable};
use crate::policy::types::*;
use crate::storage;

/// Automatic roles of a layer, weakest first. Each one is granted to the next.
pub const LAYER_AUTOMATIC_ROLES: [&str; 3] = ["observe", "use_host", "admin_host"];

/// Privileges a host's resource gives to its layer's automatic roles, paired
/// in the same order as [`LAYER_AUTOMATIC_ROLES`].
pub const HOST_LAYER_PRIVILEGES: [(&str, &str); 3] = [
    ("read", "observe"),
    ("execute", "use_host"),
    ("update", "admin_host"),
];

const PUBLIC_KEY_KIND_ANNOTATION: &str = "possum/variable/kind";
const PUBLIC_KEY_KIND: &str = "SSH public key";

/// Materialize a statement into the authorization graph.
#[async_trait]
pub trait Create {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError>;
}

/// Id of one of a layer's automatic roles, e.g. `acme:@:layer/ops/observe`.
pub fn automatic_role_id(layer: &ObjectId, name: &str) -> String {
    format!("{}:@:{}/{}/{}", layer.account, layer.kind, layer.id, name)
}

/// Look up one of a layer's automatic roles; fails if the layer was never created.
pub async fn automatic_role<C: ConnectionTrait>(
    db: &C,
    layer: &ObjectId,
    name: &str,
) -> Result<role::Model, PolicyError> {
    storage::require_role(db, &automatic_role_id(layer, name)).await
}

/// Name under which a public key is stored: the key's trailing comment field.
pub fn public_key_name(public_key: &str) -> Option<&str> {
    public_key.split_whitespace().last()
}

#[async_trait]
impl Create for Role {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.create_role(db).await?;
        Ok(())
    }
}

#[async_trait]
impl Create for Resource {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.create_resource(db).await?;
        Ok(())
    }
}

#[async_trait]
impl Create for Record {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        // The resource's owner may be derived from roles this record creates
        self.create_role(db).await?;
        self.create_resource(db).await?;
        Ok(())
    }
}

#[async_trait]
impl Create for Host {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.record.create(db).await
    }
}

impl Layer {
    pub async fn automatic_role<C: ConnectionTrait>(
        &self,
        db: &C,
        name: &str,
    ) -> Result<role::Model, PolicyError> {
        automatic_role(db, &self.record.id, name).await
    }
}

#[async_trait]
impl Create for Layer {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.record.create(db).await?;

        let mut previous: Option<String> = None;
        for name in LAYER_AUTOMATIC_ROLES {
            let role = storage::create_role(db, &automatic_role_id(&self.record.id, name)).await?;
            // observe <- use_host <- admin_host
            if let Some(weaker) = previous.as_deref() {
                storage::grant_role(db, weaker, &role.id, false).await?;
            }
            previous = Some(role.id);
        }
        Ok(())
    }
}

#[async_trait]
impl Create for Group {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.record.create(db).await?;

        if let Some(gidnumber) = self.gidnumber {
            storage::update_role_gidnumber(db, &self.record.id.to_string(), gidnumber).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Create for User {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.record.create(db).await?;

        let role_id = self.record.id.to_string();
        if let Some(uidnumber) = self.uidnumber {
            storage::update_role_uidnumber(db, &role_id, uidnumber).await?;
        }

        if self.public_keys.is_empty() {
            return Ok(());
        }

        let owner = self.record.owner().ok_or_else(|| {
            PolicyError::InvalidPolicy(format!("`{role_id}` has no owner; resolve the policy first"))
        })?;
        let owner_id = owner.to_string();

        for public_key in &self.public_keys {
            let key_name = public_key_name(public_key).ok_or_else(|| {
                PolicyError::InvalidPolicy(format!("empty public key declared for `{role_id}`"))
            })?;
            let resource_id = ObjectId::new(
                &self.record.id.account,
                "variable",
                format!("public_keys/{}/{}", self.record.id.id, key_name),
            )
            .to_string();

            let resource = storage::create_resource(db, &resource_id, &owner_id).await?;
            storage::add_annotation(db, &resource.id, PUBLIC_KEY_KIND_ANNOTATION, PUBLIC_KEY_KIND)
                .await?;
            storage::create_secret(db, &resource.id, public_key).await?;
            for privilege in ["read", "execute"] {
                storage::permit(db, &resource.id, privilege, &role_id).await?;
            }
            tracing::debug!(user = %role_id, key = %key_name, "Provisioned public key");
        }
        Ok(())
    }
}

#[async_trait]
impl Create for HostFactory {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.create_resource(db).await?;

        let id = &self.resource.id;
        let deputy = storage::create_role(db, &format!("{}:deputy:{}", id.account, id.id)).await?;
        for layer in &self.layers {
            let layer = storage::require_role(db, &layer.to_string()).await?;
            storage::grant_role(db, &layer.id, &deputy.id, false).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Create for Grant {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        for granted in &self.roles {
            for member in &self.members {
                let role = storage::require_role(db, &granted.to_string()).await?;
                let member_role = storage::require_role(db, &member.role.to_string()).await?;
                storage::grant_role(db, &role.id, &member_role.id, member.admin).await?;

                if granted.is_kind("layer") && member.role.is_kind("host") {
                    let host = storage::require_resource(db, &member.role.to_string()).await?;
                    for (privilege, automatic) in HOST_LAYER_PRIVILEGES {
                        let layer_role = automatic_role(db, granted, automatic).await?;
                        storage::permit(db, &host.id, privilege, &layer_role.id).await?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Create for Permit {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        for resource in &self.resources {
            for privilege in &self.privileges {
                for grantee in &self.roles {
                    let resource = storage::require_resource(db, &resource.to_string()).await?;
                    let role = storage::require_role(db, &grantee.to_string()).await?;
                    storage::permit(db, &resource.id, privilege, &role.id).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Create for Policy {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        self.create_role(db).await?;
        self.create_resource(db).await?;

        for statement in &self.body {
            statement.create(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Create for Statement {
    async fn create<C: ConnectionTrait>(&self, db: &C) -> Result<(), PolicyError> {
        tracing::debug!(kind = %self.kind(), id = %self.label(), "Creating statement");

        let result = match self {
            Statement::Role(s) => s.create(db).await,
            Statement::Resource(s) | Statement::Variable(s) => s.create(db).await,
            Statement::Record(s) => s.create(db).await,
            Statement::Host(s) => s.create(db).await,
            Statement::Layer(s) => s.create(db).await,
            Statement::Group(s) => s.create(db).await,
            Statement::User(s) => s.create(db).await,
            Statement::HostFactory(s) => s.create(db).await,
            Statement::Grant(s) => s.create(db).await,
            Statement::Permit(s) => s.create(db).await,
            Statement::Policy(s) => s.create(db).await,
        };
        result.map_err(|e| e.in_statement(self.kind(), self.label()))
    }
}
