use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::Agent;
use super::error::{FarmCredError, Result};
use super::geo::FarmLocation;
use super::report::{Recommendation, VerificationReport};

/// Verification request states. `Completed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Rejected,
}

/// Events that drive request status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEvent {
    AgentAssigned,
    VisitScheduled,
    VisitStarted,
    ReportApproved,
    ReportRejected,
    AdditionalInfoRequested,
    OperatorApproved,
    OperatorRejected,
    AssignmentFailed,
}

impl RequestEvent {
    /// The event an attached report produces.
    pub fn for_recommendation(recommendation: Recommendation) -> Self {
        match recommendation {
            Recommendation::Approve => RequestEvent::ReportApproved,
            Recommendation::Reject => RequestEvent::ReportRejected,
            Recommendation::RequiresAdditionalInfo => RequestEvent::AdditionalInfoRequested,
        }
    }
}

impl RequestStatus {
    /// Attempt a status transition given an event.
    /// Returns the new status or an error if the transition is invalid.
    pub fn transition(self, event: RequestEvent) -> Result<RequestStatus> {
        match (self, event) {
            (RequestStatus::Pending, RequestEvent::AgentAssigned) => Ok(RequestStatus::Assigned),

            // Scheduling records a visit time without moving the status.
            (RequestStatus::Assigned, RequestEvent::VisitScheduled) => Ok(RequestStatus::Assigned),
            (RequestStatus::Assigned, RequestEvent::VisitStarted) => Ok(RequestStatus::InProgress),

            (RequestStatus::InProgress, RequestEvent::ReportApproved) => {
                Ok(RequestStatus::Completed)
            }
            (RequestStatus::InProgress, RequestEvent::ReportRejected) => {
                Ok(RequestStatus::Rejected)
            }
            (RequestStatus::InProgress, RequestEvent::AdditionalInfoRequested) => {
                Ok(RequestStatus::InProgress)
            }
            (RequestStatus::InProgress, RequestEvent::OperatorApproved) => {
                Ok(RequestStatus::Completed)
            }
            (RequestStatus::InProgress, RequestEvent::OperatorRejected) => {
                Ok(RequestStatus::Rejected)
            }
            (RequestStatus::InProgress, RequestEvent::AssignmentFailed) => {
                Ok(RequestStatus::Rejected)
            }

            (from, event) => Err(FarmCredError::InvalidState { from, event }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Assigned => "assigned",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmType {
    Crop,
    Livestock,
    Poultry,
    Fishery,
    Mixed,
    Other,
}

impl FarmType {
    /// Specialization tag an agent should carry to inspect this kind of farm.
    pub fn specialization_tag(self) -> &'static str {
        match self {
            FarmType::Crop => "crop",
            FarmType::Livestock => "livestock",
            FarmType::Poultry => "poultry",
            FarmType::Fishery => "aquaculture",
            FarmType::Mixed => "mixed",
            FarmType::Other => "farm management",
        }
    }
}

/// Farm size bands in hectares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FarmSize {
    #[serde(rename = "0-1")]
    UpToOne,
    #[serde(rename = "1-5")]
    OneToFive,
    #[serde(rename = "5-10")]
    FiveToTen,
    #[serde(rename = "10-50")]
    TenToFifty,
    #[serde(rename = "50+")]
    OverFifty,
}

/// What a farmer hands in when asking for a farm verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub farmer_id: String,
    pub farmer_name: String,
    pub farmer_phone: String,
    pub farm_location: Option<FarmLocation>,
    #[serde(default)]
    pub farm_photos: Vec<String>,
    pub farm_type: FarmType,
    pub farm_size: FarmSize,
    #[serde(default)]
    pub priority: Priority,
}

/// One farmer's farm-verification case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub farmer_id: String,
    pub farmer_name: String,
    pub farmer_phone: String,
    pub farm_location: FarmLocation,
    pub farm_photos: Vec<String>,
    pub farm_type: FarmType,
    pub farm_size: FarmSize,
    pub status: RequestStatus,
    pub assigned_agent: Option<Agent>,
    pub scheduled_visit: Option<DateTime<Utc>>,
    pub verification_report: Option<VerificationReport>,
    pub priority: Priority,
    pub resolution_note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationRequest {
    /// Build a pending request from a submission whose location has already been checked.
    pub fn new(submission: Submission, farm_location: FarmLocation) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            farmer_id: submission.farmer_id,
            farmer_name: submission.farmer_name,
            farmer_phone: submission.farmer_phone,
            farm_location,
            farm_photos: submission.farm_photos,
            farm_type: submission.farm_type,
            farm_size: submission.farm_size,
            status: RequestStatus::Pending,
            assigned_agent: None,
            scheduled_visit: None,
            verification_report: None,
            priority: submission.priority,
            resolution_note: None,
            requested_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition event.
    pub fn apply_event(&mut self, event: RequestEvent) -> Result<()> {
        self.status = self.status.transition(event)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn assign(&mut self, agent: Agent) -> Result<()> {
        self.apply_event(RequestEvent::AgentAssigned)?;
        self.assigned_agent = Some(agent);
        Ok(())
    }

    pub fn schedule(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.scheduled_visit.is_some() {
            return Err(FarmCredError::InvalidState {
                from: self.status,
                event: RequestEvent::VisitScheduled,
            });
        }
        self.apply_event(RequestEvent::VisitScheduled)?;
        self.scheduled_visit = Some(at);
        Ok(())
    }

    /// Attach the agent's report and derive the status from its recommendation.
    pub fn attach_report(&mut self, report: VerificationReport) -> Result<()> {
        let event = RequestEvent::for_recommendation(report.recommendation);
        if self.status != RequestStatus::InProgress || self.verification_report.is_some() {
            return Err(FarmCredError::InvalidState {
                from: self.status,
                event,
            });
        }
        report.validate()?;
        if report.request_id != self.id {
            return Err(FarmCredError::validation(format!(
                "report belongs to request {}, not {}",
                report.request_id, self.id
            )));
        }
        let assigned = self.assigned_agent.as_ref().map(|a| a.id);
        if assigned != Some(report.agent_id) {
            return Err(FarmCredError::validation(format!(
                "report agent {} is not the assigned agent",
                report.agent_id
            )));
        }
        self.apply_event(event)?;
        self.verification_report = Some(report);
        Ok(())
    }

    /// In progress with a report that left the outcome to an operator.
    pub fn awaits_decision(&self) -> bool {
        self.status == RequestStatus::InProgress
            && self
                .verification_report
                .as_ref()
                .is_some_and(|r| r.recommendation == Recommendation::RequiresAdditionalInfo)
    }

    pub fn is_visit_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Assigned && self.scheduled_visit.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentLocation;
    use crate::geo::Coordinates;

    const ALL_STATUSES: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Assigned,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Rejected,
    ];

    const ALL_EVENTS: [RequestEvent; 9] = [
        RequestEvent::AgentAssigned,
        RequestEvent::VisitScheduled,
        RequestEvent::VisitStarted,
        RequestEvent::ReportApproved,
        RequestEvent::ReportRejected,
        RequestEvent::AdditionalInfoRequested,
        RequestEvent::OperatorApproved,
        RequestEvent::OperatorRejected,
        RequestEvent::AssignmentFailed,
    ];

    fn submission() -> Submission {
        Submission {
            farmer_id: "f1".into(),
            farmer_name: "John Doe".into(),
            farmer_phone: "+2348012345678".into(),
            farm_location: Some(FarmLocation::new(10.0, 10.0, "addr")),
            farm_photos: vec!["p1".into()],
            farm_type: FarmType::Crop,
            farm_size: FarmSize::OneToFive,
            priority: Priority::default(),
        }
    }

    fn request() -> VerificationRequest {
        let s = submission();
        let location = s.farm_location.clone().unwrap();
        VerificationRequest::new(s, location)
    }

    fn agent() -> Agent {
        Agent::new(
            "Fatima Abdullahi",
            "NAERLS-2024-002",
            AgentLocation {
                state: "Lagos".into(),
                lga: "Alimosho".into(),
                coordinates: Coordinates::new(10.05, 10.1),
            },
        )
    }

    #[test]
    fn test_valid_full_lifecycle() {
        let mut status = RequestStatus::Pending;
        for event in [
            RequestEvent::AgentAssigned,
            RequestEvent::VisitScheduled,
            RequestEvent::VisitStarted,
            RequestEvent::ReportApproved,
        ] {
            status = status.transition(event).unwrap();
        }
        assert_eq!(status, RequestStatus::Completed);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for status in [RequestStatus::Completed, RequestStatus::Rejected] {
            assert!(status.is_terminal());
            for event in ALL_EVENTS {
                assert!(status.transition(event).is_err(), "{status:?} accepted {event:?}");
            }
        }
    }

    #[test]
    fn test_only_listed_transitions_are_accepted() {
        let mut accepted = 0;
        for status in ALL_STATUSES {
            for event in ALL_EVENTS {
                if status.transition(event).is_ok() {
                    accepted += 1;
                }
            }
        }
        assert_eq!(accepted, 9);
    }

    #[test]
    fn test_pending_cannot_skip_to_report() {
        let result = RequestStatus::Pending.transition(RequestEvent::ReportApproved);
        assert!(matches!(
            result,
            Err(FarmCredError::InvalidState {
                from: RequestStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&RequestStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(RequestStatus::InProgress.to_string(), "in_progress");
        let size: FarmSize = serde_json::from_str("\"50+\"").unwrap();
        assert_eq!(size, FarmSize::OverFifty);
    }

    #[test]
    fn test_new_request_is_pending_and_empty() {
        let req = request();
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.assigned_agent.is_none());
        assert!(req.scheduled_visit.is_none());
        assert!(req.verification_report.is_none());
        assert_eq!(req.priority, Priority::Medium);
    }

    #[test]
    fn test_schedule_only_once() {
        let mut req = request();
        req.assign(agent()).unwrap();
        req.schedule(Utc::now()).unwrap();
        assert!(req.schedule(Utc::now()).is_err());
        assert_eq!(req.status, RequestStatus::Assigned);
    }

    #[test]
    fn test_report_from_wrong_agent_is_refused() {
        let mut req = request();
        req.assign(agent()).unwrap();
        req.apply_event(RequestEvent::VisitStarted).unwrap();
        let report = VerificationReport::new(req.id, Uuid::new_v4(), Recommendation::Approve, 90);
        assert!(matches!(
            req.attach_report(report),
            Err(FarmCredError::Validation(_))
        ));
        assert_eq!(req.status, RequestStatus::InProgress);
        assert!(req.verification_report.is_none());
    }

    #[test]
    fn test_additional_info_keeps_in_progress_and_blocks_second_report() {
        let mut req = request();
        let a = agent();
        let agent_id = a.id;
        req.assign(a).unwrap();
        req.apply_event(RequestEvent::VisitStarted).unwrap();

        let report = VerificationReport::new(
            req.id,
            agent_id,
            Recommendation::RequiresAdditionalInfo,
            40,
        );
        req.attach_report(report).unwrap();
        assert_eq!(req.status, RequestStatus::InProgress);

        let second = VerificationReport::new(req.id, agent_id, Recommendation::Approve, 90);
        assert!(matches!(
            req.attach_report(second),
            Err(FarmCredError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_awaits_decision_only_after_additional_info_report() {
        let mut req = request();
        let a = agent();
        let agent_id = a.id;
        req.assign(a).unwrap();
        req.apply_event(RequestEvent::VisitStarted).unwrap();
        assert!(!req.awaits_decision());

        let report = VerificationReport::new(req.id, agent_id, Recommendation::Approve, 90);
        req.attach_report(report).unwrap();
        assert!(!req.awaits_decision());
    }
}
