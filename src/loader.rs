use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::errors::PolicyError;
use crate::policy::resolver::admin_role_id;
use crate::policy::{parse_kdl_document, resolve, Create, Statement};
use crate::settings::ResetScope;
use crate::storage;

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub account: String,
    /// Roles removed by the reset before loading
    pub removed_roles: u64,
    /// Ids declared by top-level statements, in declaration order
    pub created: Vec<String>,
}

/// Loads policy documents into the authorization graph.
///
/// Each load runs in one transaction: reset, create the admin role, then
/// create every statement in order. Any failure rolls the whole load back.
pub struct Loader {
    db: DatabaseConnection,
    reset_scope: ResetScope,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Loader {
    pub fn new(db: DatabaseConnection, reset_scope: ResetScope) -> Self {
        Self {
            db,
            reset_scope,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Read, resolve and load a KDL policy file.
    pub async fn load_file(&self, path: &Path, account: &str) -> Result<LoadSummary, PolicyError> {
        tracing::info!(path = %path.display(), account, "Loading policy file");

        let source =
            std::fs::read_to_string(path).map_err(|source| PolicyError::PolicyLoadError {
                path: path.display().to_string(),
                source,
            })?;
        self.load(&source, account).await
    }

    /// Resolve and load a KDL policy document.
    pub async fn load(&self, source: &str, account: &str) -> Result<LoadSummary, PolicyError> {
        let statements = parse_kdl_document(source)?;
        self.load_statements(resolve(statements, account), account)
            .await
    }

    /// Load statements that have already been resolved for `account`.
    pub async fn load_statements(
        &self,
        statements: Vec<Statement>,
        account: &str,
    ) -> Result<LoadSummary, PolicyError> {
        let key = self.lock_key(account);
        let lock = self.acquire(key);
        let result = {
            let _guard = lock.lock().await;
            self.load_in_transaction(&statements, account).await
        };
        self.release(key, lock);
        result
    }

    async fn load_in_transaction(
        &self,
        statements: &[Statement],
        account: &str,
    ) -> Result<LoadSummary, PolicyError> {
        let txn = self.db.begin().await?;

        let reset_account = match self.reset_scope {
            ResetScope::All => None,
            ResetScope::Account => Some(account),
        };
        let removed_roles = storage::reset(&txn, reset_account).await?;

        storage::create_role(&txn, &admin_role_id(account).to_string()).await?;

        let mut created = Vec::new();
        for statement in statements {
            if let Err(e) = statement.create(&txn).await {
                tracing::warn!(account, error = %e, "Policy load aborted, rolling back");
                txn.rollback().await?;
                return Err(e);
            }
            if let Some(id) = statement.id() {
                created.push(id.to_string());
            }
        }

        txn.commit().await?;

        tracing::info!(
            account,
            statements = statements.len(),
            removed_roles,
            "Policy load complete"
        );

        Ok(LoadSummary {
            account: account.to_string(),
            removed_roles,
            created,
        })
    }

    /// Loads that reset the whole store contend with every other load;
    /// account-scoped loads only with the same account.
    fn lock_key<'a>(&self, account: &'a str) -> &'a str {
        match self.reset_scope {
            ResetScope::All => "*",
            ResetScope::Account => account,
        }
    }

    fn acquire(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Forget the account's lock once no other load holds or waits on it.
    fn release(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }
}
