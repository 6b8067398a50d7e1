pub mod annotation;
pub mod permission;
pub mod resource;
pub mod role;
pub mod role_membership;
pub mod secret;

pub use annotation::Entity as Annotation;
pub use permission::Entity as Permission;
pub use resource::Entity as Resource;
pub use role::Entity as Role;
pub use role_membership::Entity as RoleMembership;
pub use secret::Entity as Secret;
