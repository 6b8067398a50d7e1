//! Policy statements and how each one materializes into the authorization graph.
//!
//! A policy document is read into [`types::Statement`]s, qualified by the
//! [`resolver`], and then created in declaration order through the
//! [`create::Create`] contract. Later statements may reference anything an
//! earlier one created, so there is no reordering.

pub mod capability;
pub mod create;
pub mod document;
pub mod resolver;
pub mod types;

pub use capability::{ResourceCreatable, RoleCreatable};
pub use create::Create;
pub use document::parse_kdl_document;
pub use resolver::resolve;
pub use types::{ObjectId, Statement, StatementKind};
