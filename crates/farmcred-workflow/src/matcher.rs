use serde::{Deserialize, Serialize};

use farmcred_location::haversine_km;
use farmcred_types::{Agent, Coordinates, FarmType, VerificationRequest};

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

/// An agent eligible for a visit, with the facts it was ranked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCandidate {
    pub agent: Agent,
    pub distance_km: f64,
    pub specialization_match: bool,
}

/// Filters and ranks field agents for a farm visit.
pub struct AgentMatcher {
    /// Maximum straight-line distance between agent and farm.
    pub radius_km: f64,
}

impl Default for AgentMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_RADIUS_KM)
    }
}

impl AgentMatcher {
    pub fn new(radius_km: f64) -> Self {
        Self { radius_km }
    }

    /// Active agents close enough to visit the request's farm, best first.
    pub fn candidates(
        &self,
        request: &VerificationRequest,
        agents: &[Agent],
    ) -> Vec<AgentCandidate> {
        self.rank(
            request.farm_location.coordinates(),
            Some(request.farm_type),
            agents,
        )
    }

    /// Active agents within the radius of `center`, nearest first.
    pub fn in_area(&self, center: Coordinates, agents: &[Agent]) -> Vec<AgentCandidate> {
        self.rank(center, None, agents)
    }

    fn rank(
        &self,
        center: Coordinates,
        farm_type: Option<FarmType>,
        agents: &[Agent],
    ) -> Vec<AgentCandidate> {
        let mut candidates: Vec<AgentCandidate> = agents
            .iter()
            .filter(|a| a.is_active)
            .filter_map(|a| {
                let distance_km = haversine_km(center, a.location.coordinates);
                (distance_km <= self.radius_km).then(|| AgentCandidate {
                    agent: a.clone(),
                    distance_km,
                    specialization_match: farm_type
                        .is_some_and(|t| a.specializes_in(t.specialization_tag())),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.specialization_match
                .cmp(&a.specialization_match)
                .then(
                    a.distance_km
                        .partial_cmp(&b.distance_km)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(
                    b.agent
                        .rating
                        .partial_cmp(&a.agent.rating)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        candidates
    }
}
