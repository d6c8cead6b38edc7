//! Audit trail for mutating operations.
//!
//! Each successful write appends one [`AuditEntry`] through an [`AuditSink`]. Audit logging is
//! best effort: a failed append never undoes the write. The failure is handed to a
//! [`FaultObserver`] instead of the caller.

use async_trait::async_trait;
use bson::{Bson, doc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    backend::{Namespace, StoreBackend},
    document::{Document, DocumentId},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Action label recorded for inserts.
pub const ACTION_CREATED: &str = "created";

/// An immutable record of one mutating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened, e.g. [`ACTION_CREATED`].
    pub action: String,
    /// The affected documents as stored.
    pub documents: Vec<Document>,
    /// Logical database name.
    pub database: String,
    /// Logical collection name.
    pub collection: String,
    /// When the entry was produced.
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        action: impl Into<String>,
        documents: Vec<Document>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            documents,
            database: database.into(),
            collection: collection.into(),
            at: Utc::now(),
        }
    }

    /// Renders the entry as a storable document.
    pub fn to_document(&self) -> Document {
        doc! {
            "action": self.action.clone(),
            "documents": self.documents.iter().cloned().map(Bson::Document).collect::<Vec<_>>(),
            "database": self.database.clone(),
            "collection": self.collection.clone(),
            "at": bson::DateTime::from_chrono(self.at),
        }
    }
}

/// Destination of audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: &AuditEntry) -> DocumentStoreResult<()>;
}

/// Appends audit entries as documents to a backend namespace.
#[derive(Debug, Clone)]
pub struct BackendAuditLog<B: StoreBackend> {
    backend: B,
    namespace: Namespace,
}

impl<B: StoreBackend> BackendAuditLog<B> {
    /// Creates a log writing to `namespace`.
    pub fn new(backend: B, namespace: Namespace) -> Self {
        Self { backend, namespace }
    }
}

#[async_trait]
impl<B: StoreBackend> AuditSink for BackendAuditLog<B> {
    async fn append(&self, entry: &AuditEntry) -> DocumentStoreResult<()> {
        self.backend
            .insert_documents(vec![(DocumentId::generate(), entry.to_document())], &self.namespace)
            .await
            .map_err(|e| DocumentStoreError::Audit(e.to_string()))
    }
}

/// Discards entries. For deployments without an audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudit;

#[async_trait]
impl AuditSink for NoAudit {
    async fn append(&self, _entry: &AuditEntry) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Receives failures of side channels that must not affect the primary operation.
pub trait FaultObserver: Send + Sync {
    /// Called when appending `entry` failed after its write committed.
    fn audit_failed(&self, entry: &AuditEntry, error: &DocumentStoreError);
}

/// Reports side-channel failures as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FaultObserver for TracingObserver {
    fn audit_failed(&self, entry: &AuditEntry, error: &DocumentStoreError) {
        error!(
            action = %entry.action,
            database = %entry.database,
            collection = %entry.collection,
            documents = entry.documents.len(),
            "audit log append failed: {}",
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_document_carries_all_fields() {
        let entry = AuditEntry::new(ACTION_CREATED, vec![doc! { "_id": "1", "title": "A" }], "blog", "posts");
        let document = entry.to_document();

        assert_eq!(document.get_str("action").unwrap(), "created");
        assert_eq!(document.get_str("database").unwrap(), "blog");
        assert_eq!(document.get_str("collection").unwrap(), "posts");
        assert_eq!(document.get_array("documents").unwrap().len(), 1);
        assert!(document.get_datetime("at").is_ok());
    }
}
