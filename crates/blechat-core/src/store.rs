//! Durable chat history store
//!
//! One JSON document per local identity holds the nickname and every peer's
//! message log:
//!
//! ```json
//! { "nickname": "...", "chats": { "<peer_id>": [ {sender, content, timestamp, is_self}, ... ] } }
//! ```
//!
//! Every write goes to a temp file in the same directory, is fsynced, and is
//! renamed over the document, so a crash leaves either the old or the new
//! complete document on disk. All read-modify-write cycles serialize under
//! the store mutex; the logs share one document, so writes serialize
//! globally. An unreadable document is downgraded to an empty one with a
//! warning instead of poisoning every caller.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::StorageError;
use crate::types::{PeerId, Timestamp};

// ----------------------------------------------------------------------------
// Message Records
// ----------------------------------------------------------------------------

/// One persisted chat message.
///
/// Immutable once created; a log only grows by appending records in arrival
/// order, so insertion order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Display name of whoever authored the message.
    pub sender: String,
    /// Message text. Non-empty for every persisted record.
    pub content: String,
    /// Creation time, sortable.
    pub timestamp: Timestamp,
    /// Whether the local user authored the message.
    pub is_self: bool,
}

impl MessageRecord {
    /// Create a record stamped with the current time.
    pub fn now(sender: impl Into<String>, content: impl Into<String>, is_self: bool) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: Timestamp::now(),
            is_self,
        }
    }
}

// ----------------------------------------------------------------------------
// History Document
// ----------------------------------------------------------------------------

/// The single persisted document: local nickname plus per-peer logs.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    /// Empty string means no nickname has been saved yet.
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    chats: BTreeMap<String, Vec<MessageRecord>>,
}

// ----------------------------------------------------------------------------
// Message Store
// ----------------------------------------------------------------------------

/// Durable mapping from peer to ordered message log.
#[derive(Debug)]
pub struct MessageStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MessageStore {
    /// Open a store backed by the document at `path`, creating parent
    /// directories as needed. The document itself is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a peer's log in chronological order.
    ///
    /// Unknown peers yield an empty log, and so does an unreadable document;
    /// neither is an error for the caller.
    pub fn load(&self, peer: &PeerId) -> Vec<MessageRecord> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_document_or_empty()
            .chats
            .get(peer.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Durably append one record to a peer's log.
    ///
    /// Rejects records whose content is empty after trimming: whitespace-only
    /// input must never reach the document.
    pub fn append(&self, peer: &PeerId, record: &MessageRecord) -> Result<(), StorageError> {
        if record.content.trim().is_empty() {
            return Err(StorageError::EmptyContent);
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document_or_empty();
        doc.chats
            .entry(peer.as_str().to_string())
            .or_default()
            .push(record.clone());
        self.write_document(&doc)
    }

    /// Truncate a peer's log to empty. The key stays in the document.
    pub fn clear(&self, peer: &PeerId) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document_or_empty();
        doc.chats.insert(peer.as_str().to_string(), Vec::new());
        self.write_document(&doc)
    }

    /// Load the saved local nickname, if any.
    pub fn load_nickname(&self) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.read_document_or_empty();
        if doc.nickname.is_empty() {
            None
        } else {
            Some(doc.nickname)
        }
    }

    /// Durably save the local nickname.
    pub fn save_nickname(&self, name: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document_or_empty();
        doc.nickname = name.to_string();
        self.write_document(&doc)
    }

    fn read_document_or_empty(&self) -> HistoryDocument {
        match self.read_document() {
            Ok(doc) => doc,
            Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                HistoryDocument::default()
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "history document unreadable, treating as empty"
                );
                HistoryDocument::default()
            }
        }
    }

    fn read_document(&self) -> Result<HistoryDocument, StorageError> {
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn write_document(&self, doc: &HistoryDocument) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(doc).map_err(StorageError::Serialize)?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&payload)?;
        tmp.sync_all()?;
        drop(tmp);

        // Atomic rename: readers see the old or the new document, never a
        // truncation.
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
