use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use farmcred_types::{RequestEvent, RequestStatus};

/// What happened to a request. `event` is `None` for the initial submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub request_id: Uuid,
    pub event: Option<RequestEvent>,
    pub from: Option<RequestStatus>,
    pub to: RequestStatus,
    pub actor: String,
    pub payload: serde_json::Value,
}

impl AuditDraft {
    pub fn submitted(request_id: Uuid, actor: impl Into<String>) -> Self {
        Self {
            request_id,
            event: None,
            from: None,
            to: RequestStatus::Pending,
            actor: actor.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn transition(
        request_id: Uuid,
        event: RequestEvent,
        from: RequestStatus,
        to: RequestStatus,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            event: Some(event),
            from: Some(from),
            to,
            actor: actor.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// An immutable, hash-chained audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub event: Option<RequestEvent>,
    pub from: Option<RequestStatus>,
    pub to: RequestStatus,
    pub actor: String,
    pub payload: serde_json::Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl AuditEntry {
    pub fn seal(draft: AuditDraft, sequence: u64, previous_hash: Option<String>) -> Self {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let mut entry = Self {
            id,
            sequence,
            timestamp,
            request_id: draft.request_id,
            event: draft.event,
            from: draft.from,
            to: draft.to,
            actor: draft.actor,
            payload: draft.payload,
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// SHA-256 over every field except `hash`, hex encoded.
    pub fn compute_hash(&self) -> String {
        let input = format!(
            "{}:{}:{}:{}:{:?}:{:?}:{:?}:{}:{}:{}",
            self.id,
            self.sequence,
            self.timestamp.timestamp_nanos_opt().unwrap_or(0),
            self.request_id,
            self.event,
            self.from,
            self.to,
            self.actor,
            self.payload,
            self.previous_hash.as_deref().unwrap_or("genesis"),
        );
        let digest = Sha256::digest(input.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Check that every entry's hash matches its content and links to its predecessor.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    for (i, entry) in entries.iter().enumerate() {
        if entry.hash != entry.compute_hash() {
            return false;
        }
        let expected_prev = if i == 0 {
            None
        } else {
            Some(&entries[i - 1].hash)
        };
        if entry.previous_hash.as_ref() != expected_prev {
            return false;
        }
    }
    true
}
