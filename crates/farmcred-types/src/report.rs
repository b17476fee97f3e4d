use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FarmCredError, Result};
use crate::geo::Coordinates;

/// What the agent recommends after the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Reject,
    RequiresAdditionalInfo,
}

/// Outcome of an agent's physical visit. Immutable once attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub request_id: Uuid,
    pub visit_date: DateTime<Utc>,
    pub farm_exists: bool,
    pub farm_size_accurate: bool,
    pub farm_type_accurate: bool,
    pub location_accurate: bool,
    #[serde(default)]
    pub additional_notes: String,
    #[serde(default)]
    pub verification_photos: Vec<String>,
    pub gps_coordinates: Option<Coordinates>,
    pub recommendation: Recommendation,
    /// 0 to 100.
    pub confidence_score: u8,
    pub created_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn new(
        request_id: Uuid,
        agent_id: Uuid,
        recommendation: Recommendation,
        confidence_score: u8,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            request_id,
            visit_date: now,
            farm_exists: true,
            farm_size_accurate: true,
            farm_type_accurate: true,
            location_accurate: true,
            additional_notes: String::new(),
            verification_photos: Vec::new(),
            gps_coordinates: None,
            recommendation,
            confidence_score,
            created_at: now,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = notes.into();
        self
    }

    pub fn with_findings(
        mut self,
        farm_exists: bool,
        farm_size_accurate: bool,
        farm_type_accurate: bool,
        location_accurate: bool,
    ) -> Self {
        self.farm_exists = farm_exists;
        self.farm_size_accurate = farm_size_accurate;
        self.farm_type_accurate = farm_type_accurate;
        self.location_accurate = location_accurate;
        self
    }

    /// Checks the fields that do not depend on the request it is attached to.
    pub fn validate(&self) -> Result<()> {
        if self.confidence_score > 100 {
            return Err(FarmCredError::validation(format!(
                "confidence score must be between 0 and 100, got {}",
                self.confidence_score
            )));
        }
        if self.gps_coordinates.is_some_and(|gps| !gps.is_valid()) {
            return Err(FarmCredError::validation(
                "report GPS coordinates are out of range",
            ));
        }
        Ok(())
    }
}
