use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farmcred_store::{AuditDraft, AuditEntry, AuditLog, RequestStore};
use farmcred_types::{
    Agent, FarmCredError, RequestEvent, RequestStatus, Result, Submission, VerificationReport,
    VerificationRequest,
};

pub const DEFAULT_MAX_PHOTOS: usize = 5;

/// Limits applied when a farmer submits a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
}

fn default_max_photos() -> usize {
    DEFAULT_MAX_PHOTOS
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_photos: default_max_photos(),
        }
    }
}

/// An operator's ruling on a request whose report asked for more information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn event(self) -> RequestEvent {
        match self {
            Decision::Approve => RequestEvent::OperatorApproved,
            Decision::Reject => RequestEvent::OperatorRejected,
        }
    }
}

/// Drives verification requests through their lifecycle. Every state change
/// goes through the request store atomically and is recorded in the audit log.
pub struct VerificationWorkflow {
    requests: Arc<dyn RequestStore>,
    audit: Arc<dyn AuditLog>,
    config: WorkflowConfig,
}

impl VerificationWorkflow {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        audit: Arc<dyn AuditLog>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            requests,
            audit,
            config,
        }
    }

    /// Validate and store a new request. Nothing is stored when validation fails.
    pub async fn submit(&self, submission: Submission) -> Result<Uuid> {
        self.validate_submission(&submission)?;
        let location = submission
            .farm_location
            .clone()
            .ok_or_else(|| FarmCredError::validation("farm location is required"))?;

        let farmer_id = submission.farmer_id.clone();
        let request = VerificationRequest::new(submission, location);
        let id = request.id;
        self.requests.insert(request).await?;
        self.record(AuditDraft::submitted(id, farmer_id.as_str())).await;

        tracing::info!(request_id = %id, farmer_id = %farmer_id, "verification request submitted");
        Ok(id)
    }

    fn validate_submission(&self, submission: &Submission) -> Result<()> {
        if submission.farmer_id.trim().is_empty() {
            return Err(FarmCredError::validation("farmer id is required"));
        }
        let location = submission
            .farm_location
            .as_ref()
            .ok_or_else(|| FarmCredError::validation("farm location is required"))?;
        if !location.coordinates().is_valid() {
            return Err(FarmCredError::validation(format!(
                "farm location ({}, {}) is not a valid coordinate",
                location.latitude, location.longitude
            )));
        }
        if submission.farm_photos.is_empty() {
            return Err(FarmCredError::validation(
                "at least one farm photo is required",
            ));
        }
        if submission.farm_photos.len() > self.config.max_photos {
            return Err(FarmCredError::validation(format!(
                "at most {} farm photos are allowed",
                self.config.max_photos
            )));
        }
        if submission.farm_photos.iter().any(|p| p.trim().is_empty()) {
            return Err(FarmCredError::validation("photo references must not be empty"));
        }
        Ok(())
    }

    pub async fn get_status(&self, id: Uuid) -> Result<VerificationRequest> {
        self.requests
            .get(id)
            .await?
            .ok_or(FarmCredError::NotFound(id))
    }

    pub async fn assign_agent(&self, id: Uuid, agent: Agent) -> Result<VerificationRequest> {
        if !agent.is_active {
            return Err(FarmCredError::validation(format!(
                "agent {} is not active",
                agent.id
            )));
        }
        let payload = serde_json::json!({ "agent_id": agent.id, "agent_name": agent.name });
        self.transition(id, RequestEvent::AgentAssigned, "operator", payload, |r| {
            r.assign(agent)
        })
        .await
    }

    pub async fn schedule_visit(&self, id: Uuid, at: DateTime<Utc>) -> Result<VerificationRequest> {
        let payload = serde_json::json!({ "scheduled_visit": at });
        self.transition(id, RequestEvent::VisitScheduled, "operator", payload, |r| {
            r.schedule(at)
        })
        .await
    }

    pub async fn start_visit(&self, id: Uuid) -> Result<VerificationRequest> {
        self.transition(
            id,
            RequestEvent::VisitStarted,
            "agent",
            serde_json::Value::Null,
            |r| r.apply_event(RequestEvent::VisitStarted),
        )
        .await
    }

    /// Move every assigned request whose scheduled visit time has passed to
    /// `in_progress`. Requests that change state concurrently are skipped.
    pub async fn start_due_visits(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let due: Vec<Uuid> = self
            .requests
            .list_by_status(RequestStatus::Assigned)
            .await?
            .into_iter()
            .filter(|r| r.is_visit_due(now))
            .map(|r| r.id)
            .collect();

        let mut started = Vec::with_capacity(due.len());
        for id in due {
            let result = self
                .transition(
                    id,
                    RequestEvent::VisitStarted,
                    "scheduler",
                    serde_json::Value::Null,
                    move |r| {
                        if !r.is_visit_due(now) {
                            return Err(FarmCredError::InvalidState {
                                from: r.status,
                                event: RequestEvent::VisitStarted,
                            });
                        }
                        r.apply_event(RequestEvent::VisitStarted)
                    },
                )
                .await;
            match result {
                Ok(_) => started.push(id),
                Err(FarmCredError::InvalidState { .. }) => {
                    tracing::debug!(request_id = %id, "visit already started elsewhere");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(started)
    }

    /// Attach the field agent's report. The recommendation decides the next status.
    pub async fn attach_report(
        &self,
        id: Uuid,
        report: VerificationReport,
    ) -> Result<VerificationRequest> {
        let event = RequestEvent::for_recommendation(report.recommendation);
        let payload = serde_json::json!({
            "report_id": report.id,
            "recommendation": report.recommendation,
            "confidence_score": report.confidence_score,
        });
        self.transition(id, event, "agent", payload, |r| r.attach_report(report))
            .await
    }

    /// Resolve a request left open by a report that asked for more information.
    pub async fn decide(
        &self,
        id: Uuid,
        decision: Decision,
        note: impl Into<String>,
    ) -> Result<VerificationRequest> {
        let note = note.into();
        let event = decision.event();
        let payload = serde_json::json!({ "decision": decision, "note": note });
        self.transition(id, event, "operator", payload, |r| {
            if !r.awaits_decision() {
                return Err(FarmCredError::InvalidState {
                    from: r.status,
                    event,
                });
            }
            r.apply_event(event)?;
            r.resolution_note = Some(note);
            Ok(())
        })
        .await
    }

    /// Close a visit that could not be carried out.
    pub async fn fail_assignment(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<VerificationRequest> {
        let reason = reason.into();
        let payload = serde_json::json!({ "reason": reason });
        self.transition(id, RequestEvent::AssignmentFailed, "operator", payload, |r| {
            r.apply_event(RequestEvent::AssignmentFailed)?;
            r.resolution_note = Some(reason);
            Ok(())
        })
        .await
    }

    pub async fn list_for_farmer(&self, farmer_id: &str) -> Result<Vec<VerificationRequest>> {
        self.requests.list_by_farmer(farmer_id).await
    }

    /// Audit entries for one request, oldest first.
    pub async fn history(&self, id: Uuid) -> Result<Vec<AuditEntry>> {
        self.get_status(id).await?;
        self.audit.for_request(id).await
    }

    async fn transition<F>(
        &self,
        id: Uuid,
        event: RequestEvent,
        actor: &str,
        payload: serde_json::Value,
        change: F,
    ) -> Result<VerificationRequest>
    where
        F: FnOnce(&mut VerificationRequest) -> Result<()> + Send,
    {
        let mut from = None;
        let updated = self
            .requests
            .modify(
                id,
                Box::new(|r: &mut VerificationRequest| {
                    from = Some(r.status);
                    change(r)
                }),
            )
            .await;
        let updated = match updated {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(request_id = %id, ?event, %e, "transition refused");
                return Err(e);
            }
        };

        let from = from.unwrap_or(updated.status);
        tracing::info!(
            request_id = %id,
            ?event,
            from = %from,
            to = %updated.status,
            actor,
            "request transitioned"
        );
        let draft =
            AuditDraft::transition(id, event, from, updated.status, actor).with_payload(payload);
        self.record(draft).await;
        Ok(updated)
    }

    /// The state change has already been committed, so a failed append is
    /// logged rather than surfaced to the caller.
    async fn record(&self, draft: AuditDraft) {
        let request_id = draft.request_id;
        if let Err(e) = self.audit.append(draft).await {
            tracing::error!(%request_id, %e, "failed to append audit entry");
        }
    }
}
