use miette::Diagnostic;
use thiserror::Error;

use crate::policy::types::StatementKind;

#[derive(Debug, Error, Diagnostic)]
pub enum PolicyError {
    #[error("Referenced entity `{id}` does not exist")]
    #[diagnostic(
        code(possum::reference_not_found),
        help("Declare `{id}` in a statement that comes before the one referencing it")
    )]
    ReferenceNotFound { id: String },

    #[error("Entity `{id}` already exists")]
    #[diagnostic(
        code(possum::duplicate_entity),
        help("Role and resource ids are unique; declare `{id}` only once per load")
    )]
    DuplicateEntity { id: String },

    #[error("Database error: {0}")]
    #[diagnostic(code(possum::persistence))]
    Persistence(#[from] sea_orm::DbErr),

    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(possum::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(code(possum::invalid_policy))]
    InvalidPolicy(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(possum::kdl_parse),
        help("Check the document against the KDL v2 syntax at https://kdl.dev")
    )]
    KdlParse(String),

    #[error("Failed to create {kind} `{id}`: {source}")]
    #[diagnostic(code(possum::statement))]
    Statement {
        kind: StatementKind,
        id: String,
        #[source]
        source: Box<PolicyError>,
    },
}

impl PolicyError {
    /// Attach the failing statement, keeping the innermost one when nested
    /// policies propagate a child's error.
    pub fn in_statement(self, kind: StatementKind, id: impl Into<String>) -> Self {
        match self {
            err @ PolicyError::Statement { .. } => err,
            other => PolicyError::Statement {
                kind,
                id: id.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any statement context stripped.
    pub fn root(&self) -> &PolicyError {
        match self {
            PolicyError::Statement { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_statement_wraps_once() {
        let err = PolicyError::ReferenceNotFound {
            id: "acme:user:bob".into(),
        }
        .in_statement(StatementKind::Grant, "acme:group:devs")
        .in_statement(StatementKind::Policy, "acme:policy:prod");

        match &err {
            PolicyError::Statement { kind, id, .. } => {
                assert_eq!(*kind, StatementKind::Grant);
                assert_eq!(id, "acme:group:devs");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            err.root(),
            PolicyError::ReferenceNotFound { id } if id == "acme:user:bob"
        ));
    }

    #[test]
    fn test_statement_message_names_kind_and_id() {
        let err = PolicyError::DuplicateEntity {
            id: "acme:role:ops".into(),
        }
        .in_statement(StatementKind::Role, "acme:role:ops");
        assert_eq!(
            err.to_string(),
            "Failed to create role `acme:role:ops`: Entity `acme:role:ops` already exists"
        );
    }
}
