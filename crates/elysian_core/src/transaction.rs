//! Transaction buffer.
//!
//! A transaction is an ordered list of write, update and delete operations
//! staged in memory. Committing replays them in order through an
//! [`Engine`]; there is no isolation and no undo. An operation that fails
//! stops the commit, and the effects of the operations before it remain.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use chrono::Utc;
use elysian_store::Document;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Kind of a staged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create or replace a document.
    Write,
    /// Shallow-merge a patch into an existing document.
    Update,
    /// Delete a document.
    Delete,
}

/// One staged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOperation {
    /// What to do.
    pub kind: OperationKind,
    /// Entity type.
    pub entity: String,
    /// Target id; required for updates and deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document or patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Document>,
}

impl TransactionOperation {
    /// Stages a write of `doc`.
    pub fn write(entity: impl Into<String>, doc: Document) -> Self {
        Self {
            kind: OperationKind::Write,
            entity: entity.into(),
            id: None,
            data: Some(doc),
        }
    }

    /// Stages an update of `id` with `patch`.
    pub fn update(entity: impl Into<String>, id: impl Into<String>, patch: Document) -> Self {
        Self {
            kind: OperationKind::Update,
            entity: entity.into(),
            id: Some(id.into()),
            data: Some(patch),
        }
    }

    /// Stages a delete of `id`.
    pub fn delete(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity: entity.into(),
            id: Some(id.into()),
            data: None,
        }
    }

    fn target_id(&self) -> CoreResult<&str> {
        self.id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            CoreError::invalid_operation(format!("{:?} on {} requires an id", self.kind, self.entity))
        })
    }

    fn apply(self, engine: &dyn Engine) -> CoreResult<()> {
        match self.kind {
            OperationKind::Write => {
                let mut doc = self.data.unwrap_or_default();
                let errors = engine.write_entity(&self.entity, &mut doc)?;
                if !errors.is_empty() {
                    return Err(CoreError::Validation { errors });
                }
            }
            OperationKind::Update => {
                let id = self.target_id()?.to_string();
                let patch = self.data.unwrap_or_default();
                if engine.update_entity_by_id(&self.entity, &id, patch)?.is_none() {
                    return Err(CoreError::UpdateFailed {
                        entity: self.entity,
                        id,
                    });
                }
            }
            OperationKind::Delete => {
                let id = self.target_id()?;
                engine.delete_entity_by_id(&self.entity, id);
            }
        }
        Ok(())
    }
}

/// A staged transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, a UTC timestamp with nanoseconds.
    pub id: String,
    /// Operations in commit order.
    pub operations: Vec<TransactionOperation>,
}

/// Open transactions by id.
#[derive(Debug, Default)]
pub struct TransactionManager {
    transactions: Mutex<HashMap<String, Transaction>>,
}

impl TransactionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction and returns its id.
    pub fn begin(&self) -> String {
        let base = Utc::now().format("%Y%m%d%H%M%S%.9f").to_string();
        let mut transactions = self.transactions.lock();
        let mut id = base.clone();
        let mut suffix = 1;
        while transactions.contains_key(&id) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }
        transactions.insert(
            id.clone(),
            Transaction {
                id: id.clone(),
                operations: Vec::new(),
            },
        );
        id
    }

    /// Appends an operation to transaction `id`.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` for an unknown id; `InvalidOperation` for an
    /// update or delete without a target id.
    pub fn add_operation(&self, id: &str, operation: TransactionOperation) -> CoreResult<()> {
        if operation.kind != OperationKind::Write {
            operation.target_id()?;
        }
        let mut transactions = self.transactions.lock();
        let transaction = transactions
            .get_mut(id)
            .ok_or_else(|| CoreError::TransactionNotFound { id: id.to_string() })?;
        transaction.operations.push(operation);
        Ok(())
    }

    /// Returns a copy of transaction `id`.
    pub fn get(&self, id: &str) -> Option<Transaction> {
        self.transactions.lock().get(id).cloned()
    }

    /// Number of open transactions.
    pub fn len(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Returns true if no transaction is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes transaction `id` and applies its operations in order.
    ///
    /// The transaction is removed before anything is applied, so it is gone
    /// even when an operation fails.
    pub fn commit(&self, id: &str, engine: &dyn Engine) -> CoreResult<usize> {
        let transaction = self
            .transactions
            .lock()
            .remove(id)
            .ok_or_else(|| CoreError::TransactionNotFound { id: id.to_string() })?;

        let count = transaction.operations.len();
        for operation in transaction.operations {
            operation.apply(engine)?;
        }
        debug!(transaction = id, operations = count, "transaction committed");
        Ok(count)
    }

    /// Discards transaction `id`. Returns false if it did not exist.
    pub fn rollback(&self, id: &str) -> bool {
        let existed = self.transactions.lock().remove(id).is_some();
        if existed {
            debug!(transaction = id, "transaction rolled back");
        }
        existed
    }
}
