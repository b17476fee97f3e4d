use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::{AuditDraft, AuditEntry, verify_chain};
use crate::traits::{AgentStore, AuditLog, RequestChange, RequestStore};
use farmcred_types::{Agent, FarmCredError, RequestStatus, VerificationRequest};

/// Everything the in-memory store holds, in a serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub requests: Vec<VerificationRequest>,
    pub agents: Vec<Agent>,
    pub audit: Vec<AuditEntry>,
}

/// In-memory store implementation (default).
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    requests: Arc<DashMap<Uuid, VerificationRequest>>,
    agents: Arc<DashMap<Uuid, Agent>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
    audit_by_request: Arc<DashMap<Uuid, Vec<usize>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            agents: Arc::new(DashMap::new()),
            audit: Arc::new(RwLock::new(Vec::new())),
            audit_by_request: Arc::new(DashMap::new()),
        }
    }

    /// Rebuild a store from a snapshot, re-indexing the audit trail.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::new();
        for request in snapshot.requests {
            store.requests.insert(request.id, request);
        }
        for agent in snapshot.agents {
            store.agents.insert(agent.id, agent);
        }
        for (idx, entry) in snapshot.audit.iter().enumerate() {
            store
                .audit_by_request
                .entry(entry.request_id)
                .or_default()
                .push(idx);
        }
        store.audit = Arc::new(RwLock::new(snapshot.audit));
        store
    }

    pub async fn snapshot(&self) -> Snapshot {
        let mut requests: Vec<VerificationRequest> =
            self.requests.iter().map(|r| r.value().clone()).collect();
        requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        let audit = self.audit.read().await.clone();
        Snapshot {
            requests,
            agents,
            audit,
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Overwrite a request that has already been validated and persisted.
    #[cfg(feature = "file-store")]
    pub(crate) fn put_request(&self, request: VerificationRequest) {
        self.requests.insert(request.id, request);
    }

    /// Append an entry sealed against the current chain head.
    #[cfg(feature = "file-store")]
    pub(crate) async fn push_sealed(&self, entry: AuditEntry) {
        let mut entries = self.audit.write().await;
        self.audit_by_request
            .entry(entry.request_id)
            .or_default()
            .push(entries.len());
        entries.push(entry);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn insert(&self, request: VerificationRequest) -> Result<(), FarmCredError> {
        if self.requests.contains_key(&request.id) {
            return Err(FarmCredError::Storage(format!(
                "request {} already exists",
                request.id
            )));
        }
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<VerificationRequest>, FarmCredError> {
        Ok(self.requests.get(&id).map(|r| r.value().clone()))
    }

    async fn modify(
        &self,
        id: Uuid,
        change: RequestChange<'_>,
    ) -> Result<VerificationRequest, FarmCredError> {
        let mut slot = self
            .requests
            .get_mut(&id)
            .ok_or(FarmCredError::NotFound(id))?;
        let mut updated = slot.value().clone();
        change(&mut updated)?;
        *slot.value_mut() = updated.clone();
        Ok(updated)
    }

    async fn list_by_farmer(
        &self,
        farmer_id: &str,
    ) -> Result<Vec<VerificationRequest>, FarmCredError> {
        let mut requests: Vec<VerificationRequest> = self
            .requests
            .iter()
            .filter(|r| r.value().farmer_id == farmer_id)
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<VerificationRequest>, FarmCredError> {
        let mut requests: Vec<VerificationRequest> = self
            .requests
            .iter()
            .filter(|r| r.value().status == status)
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(requests)
    }
}

#[async_trait]
impl AgentStore for InMemoryStore {
    async fn register(&self, agent: Agent) -> Result<(), FarmCredError> {
        if self.agents.contains_key(&agent.id) {
            return Err(FarmCredError::Storage(format!(
                "agent {} already registered",
                agent.id
            )));
        }
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, FarmCredError> {
        Ok(self.agents.get(&id).map(|a| a.value().clone()))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, FarmCredError> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(agents)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Agent, FarmCredError> {
        let mut agent = self
            .agents
            .get_mut(&id)
            .ok_or(FarmCredError::AgentNotFound(id))?;
        agent.is_active = active;
        Ok(agent.clone())
    }
}

#[async_trait]
impl AuditLog for InMemoryStore {
    async fn append(&self, draft: AuditDraft) -> Result<AuditEntry, FarmCredError> {
        let mut entries = self.audit.write().await;
        let idx = entries.len();
        let previous_hash = entries.last().map(|e| e.hash.clone());
        let entry = AuditEntry::seal(draft, idx as u64, previous_hash);

        self.audit_by_request
            .entry(entry.request_id)
            .or_default()
            .push(idx);

        entries.push(entry.clone());
        Ok(entry)
    }

    async fn for_request(&self, request_id: Uuid) -> Result<Vec<AuditEntry>, FarmCredError> {
        let entries = self.audit.read().await;
        Ok(self
            .audit_by_request
            .get(&request_id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_entries(&self) -> Result<Vec<AuditEntry>, FarmCredError> {
        let entries = self.audit.read().await;
        Ok(entries.clone())
    }

    async fn verify_integrity(&self) -> Result<bool, FarmCredError> {
        let entries = self.audit.read().await;
        Ok(verify_chain(&entries))
    }
}
