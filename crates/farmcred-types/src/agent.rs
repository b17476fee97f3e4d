use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

/// Where an agent is based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentLocation {
    pub state: String,
    pub lga: String,
    pub coordinates: Coordinates,
}

/// A certified field verifier who physically inspects farms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub certification_id: String,
    pub location: AgentLocation,
    pub specializations: Vec<String>,
    /// Score between 0 and 5.
    pub rating: f64,
    /// Maintained by the backend; the workflow never changes it.
    pub total_verifications: u32,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        certification_id: impl Into<String>,
        location: AgentLocation,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            certification_id: certification_id.into(),
            location,
            specializations: Vec::new(),
            rating: 0.0,
            total_verifications: 0,
            is_active: true,
            registered_at: Utc::now(),
        }
    }

    pub fn with_specializations(mut self, specializations: Vec<String>) -> Self {
        self.specializations = specializations;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating.clamp(0.0, 5.0);
        self
    }

    pub fn with_contact(mut self, email: impl Into<String>, phone: impl Into<String>) -> Self {
        self.email = email.into();
        self.phone = phone.into();
        self
    }

    /// Case-insensitive substring match against the specialization tags,
    /// so `"crop"` matches `"Crop Farming"`.
    pub fn specializes_in(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.specializations
            .iter()
            .any(|s| s.to_lowercase().contains(&tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lagos() -> AgentLocation {
        AgentLocation {
            state: "Lagos".into(),
            lga: "Ikorodu".into(),
            coordinates: Coordinates::new(6.6018, 3.5106),
        }
    }

    #[test]
    fn test_agent_defaults() {
        let agent = Agent::new("Adebayo Ogundimu", "NAERLS-2024-001", lagos());
        assert!(agent.is_active);
        assert_eq!(agent.total_verifications, 0);
        assert!(agent.specializations.is_empty());
    }

    #[test]
    fn test_rating_is_clamped() {
        let agent = Agent::new("a", "c", lagos()).with_rating(7.5);
        assert!((agent.rating - 5.0).abs() < f64::EPSILON);
        let agent = Agent::new("a", "c", lagos()).with_rating(-1.0);
        assert!(agent.rating.abs() < f64::EPSILON);
    }

    #[test]
    fn test_specializes_in() {
        let agent = Agent::new("a", "c", lagos())
            .with_specializations(vec!["Crop Farming".into(), "Livestock".into()]);
        assert!(agent.specializes_in("crop"));
        assert!(agent.specializes_in("LIVESTOCK"));
        assert!(!agent.specializes_in("poultry"));
    }
}
