use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::{AuditDraft, AuditEntry};
use farmcred_types::{Agent, FarmCredError, RequestStatus, VerificationRequest};

/// A change applied atomically to one stored request. Returning an error
/// leaves the stored record untouched.
pub type RequestChange<'a> =
    Box<dyn FnOnce(&mut VerificationRequest) -> Result<(), FarmCredError> + Send + 'a>;

/// Collection of verification requests, keyed by request id.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Store a new request. Fails if the id is already taken.
    async fn insert(&self, request: VerificationRequest) -> Result<(), FarmCredError>;

    async fn get(&self, id: Uuid) -> Result<Option<VerificationRequest>, FarmCredError>;

    /// Apply `change` to the stored request and return the updated copy.
    async fn modify(
        &self,
        id: Uuid,
        change: RequestChange<'_>,
    ) -> Result<VerificationRequest, FarmCredError>;

    /// Requests belonging to one farmer, newest first.
    async fn list_by_farmer(
        &self,
        farmer_id: &str,
    ) -> Result<Vec<VerificationRequest>, FarmCredError>;

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<VerificationRequest>, FarmCredError>;
}

/// Registry of field agents.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn register(&self, agent: Agent) -> Result<(), FarmCredError>;

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, FarmCredError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, FarmCredError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Agent, FarmCredError>;
}

/// Append-only, hash-chained record of every request transition.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Seal `draft` onto the end of the chain and return the stored entry.
    async fn append(&self, draft: AuditDraft) -> Result<AuditEntry, FarmCredError>;

    async fn for_request(&self, request_id: Uuid) -> Result<Vec<AuditEntry>, FarmCredError>;

    async fn all_entries(&self) -> Result<Vec<AuditEntry>, FarmCredError>;

    async fn verify_integrity(&self) -> Result<bool, FarmCredError>;
}
