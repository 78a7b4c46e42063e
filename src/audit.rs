//! Metadata-only audit logging.
//!
//! Records every envelope operation the application chooses to audit. The
//! log is append-only and built exclusively from [`EnvelopeMetadata`], so no
//! ciphertext, IV, tag or share can reach it. Supports pluggable sinks for
//! forwarding records to files, object storage, etc.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::envelope::{get_envelope_metadata, Envelope, EnvelopeMetadata};

/// What was done with the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Encrypt,
    Decrypt,
    Reencrypt,
}

/// A sink that receives audit records. Implement this to forward records
/// to a file, database, object store, or other persistent store.
pub trait AuditSink: Send {
    /// Append a record. Called for every audited operation.
    fn append(&mut self, record: AuditRecord);
}

/// A permanent record of one envelope operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub operation: AuditOperation,
    pub metadata: EnvelopeMetadata,
    /// When the operation was recorded.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(operation: AuditOperation, envelope: &Envelope) -> Self {
        Self {
            operation,
            metadata: get_envelope_metadata(envelope),
            timestamp: Utc::now(),
        }
    }
}

/// An append-only log of audited operations.
/// Can forward records to additional sinks via `add_forward_sink`.
#[derive(Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
    forward_sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("records", &self.records)
            .field("forward_sinks", &self.forward_sinks.len())
            .finish()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to receive a copy of every record, without replacing the
    /// in-memory log.
    pub fn add_forward_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.forward_sinks.push(sink);
    }

    /// Record an operation on `envelope`.
    pub fn record(&mut self, operation: AuditOperation, envelope: &Envelope) {
        self.append(AuditRecord::new(operation, envelope));
    }

    /// Append a record to the log and forward to any attached sinks.
    pub fn append(&mut self, record: AuditRecord) {
        for sink in self.forward_sinks.iter_mut() {
            sink.append(record.clone());
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditRecord> {
        self.records.iter()
    }

    /// Records for one envelope id, oldest first.
    pub fn history<'a>(&'a self, envelope_id: &'a str) -> impl Iterator<Item = &'a AuditRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.metadata.id == envelope_id)
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

/// Writes audit records as JSON lines (one per record) to a file.
/// Creates the file if it doesn't exist; appends if it does.
pub struct FileAuditSink {
    file: std::fs::File,
}

impl FileAuditSink {
    /// Open or create a file for append-only audit logging.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&mut self, record: AuditRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit record");
                return;
            }
        };
        if let Err(e) = writeln!(self.file, "{line}").and_then(|_| self.file.flush()) {
            warn!(envelope_id = %record.metadata.id, error = %e, "failed to write audit record");
        }
    }
}
