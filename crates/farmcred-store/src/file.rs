use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::audit::{AuditDraft, AuditEntry};
use crate::memory::{InMemoryStore, Snapshot};
use crate::traits::{AgentStore, AuditLog, RequestChange, RequestStore};
use farmcred_types::{Agent, FarmCredError, RequestStatus, VerificationRequest};

/// JSON snapshot store: serves reads from memory and rewrites `state.json`
/// atomically (.tmp → rename) on every mutation. A mutation reaches memory
/// only once the snapshot containing it has been written.
pub struct FileStore {
    path: PathBuf,
    inner: InMemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store in `state_dir`, loading any existing snapshot.
    pub fn open(state_dir: &Path) -> Result<Self, FarmCredError> {
        let path = state_dir.join("state.json");
        let inner = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| storage_error("Failed to read state file", e))?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            InMemoryStore::from_snapshot(snapshot)
        } else {
            InMemoryStore::new()
        };
        tracing::debug!(
            path = %path.display(),
            requests = inner.request_count(),
            "opened file store"
        );
        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Callers hold `write_lock` so the snapshot on disk and the one in
    /// memory advance together.
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), FarmCredError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("Failed to create state directory", e))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| storage_error("Failed to write temp state file", e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| storage_error("Failed to rename temp state file", e))?;
        Ok(())
    }
}

fn storage_error(context: &str, err: std::io::Error) -> FarmCredError {
    FarmCredError::Storage(format!("{context}: {err}"))
}

#[async_trait]
impl RequestStore for FileStore {
    async fn insert(&self, request: VerificationRequest) -> Result<(), FarmCredError> {
        let _guard = self.write_lock.lock().await;
        if self.inner.get(request.id).await?.is_some() {
            return Err(FarmCredError::Storage(format!(
                "request {} already exists",
                request.id
            )));
        }
        let mut snapshot = self.inner.snapshot().await;
        snapshot.requests.push(request.clone());
        self.persist(&snapshot).await?;
        self.inner.insert(request).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<VerificationRequest>, FarmCredError> {
        self.inner.get(id).await
    }

    async fn modify(
        &self,
        id: Uuid,
        change: RequestChange<'_>,
    ) -> Result<VerificationRequest, FarmCredError> {
        let _guard = self.write_lock.lock().await;
        let mut updated = self.inner.get(id).await?.ok_or(FarmCredError::NotFound(id))?;
        change(&mut updated)?;

        let mut snapshot = self.inner.snapshot().await;
        if let Some(slot) = snapshot.requests.iter_mut().find(|r| r.id == id) {
            *slot = updated.clone();
        }
        self.persist(&snapshot).await?;
        self.inner.put_request(updated.clone());
        Ok(updated)
    }

    async fn list_by_farmer(
        &self,
        farmer_id: &str,
    ) -> Result<Vec<VerificationRequest>, FarmCredError> {
        self.inner.list_by_farmer(farmer_id).await
    }

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<VerificationRequest>, FarmCredError> {
        self.inner.list_by_status(status).await
    }
}

#[async_trait]
impl AgentStore for FileStore {
    async fn register(&self, agent: Agent) -> Result<(), FarmCredError> {
        let _guard = self.write_lock.lock().await;
        if self.inner.get_agent(agent.id).await?.is_some() {
            return Err(FarmCredError::Storage(format!(
                "agent {} already registered",
                agent.id
            )));
        }
        let mut snapshot = self.inner.snapshot().await;
        snapshot.agents.push(agent.clone());
        self.persist(&snapshot).await?;
        self.inner.register(agent).await
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, FarmCredError> {
        self.inner.get_agent(id).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, FarmCredError> {
        self.inner.list_agents().await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Agent, FarmCredError> {
        let _guard = self.write_lock.lock().await;
        if self.inner.get_agent(id).await?.is_none() {
            return Err(FarmCredError::AgentNotFound(id));
        }
        let mut snapshot = self.inner.snapshot().await;
        if let Some(agent) = snapshot.agents.iter_mut().find(|a| a.id == id) {
            agent.is_active = active;
        }
        self.persist(&snapshot).await?;
        self.inner.set_active(id, active).await
    }
}

#[async_trait]
impl AuditLog for FileStore {
    async fn append(&self, draft: AuditDraft) -> Result<AuditEntry, FarmCredError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.inner.snapshot().await;
        let previous_hash = snapshot.audit.last().map(|e| e.hash.clone());
        let entry = AuditEntry::seal(draft, snapshot.audit.len() as u64, previous_hash);
        snapshot.audit.push(entry.clone());
        self.persist(&snapshot).await?;
        self.inner.push_sealed(entry.clone()).await;
        Ok(entry)
    }

    async fn for_request(&self, request_id: Uuid) -> Result<Vec<AuditEntry>, FarmCredError> {
        self.inner.for_request(request_id).await
    }

    async fn all_entries(&self) -> Result<Vec<AuditEntry>, FarmCredError> {
        self.inner.all_entries().await
    }

    async fn verify_integrity(&self) -> Result<bool, FarmCredError> {
        self.inner.verify_integrity().await
    }
}
