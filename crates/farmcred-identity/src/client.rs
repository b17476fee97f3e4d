//! HTTP client for the NIN and BVN verification APIs.
//!
//! Every public method returns an [`IdentityCheck`]; transport failures,
//! non-success statuses and missing configuration all come back as
//! `is_valid = false` with a message the UI can show next to a retry button.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IdentityError;
use crate::format::{is_valid_identity_number, mask};

/// Personal-data keys compared by [`IdentityClient::cross_verify`].
const CROSS_CHECK_FIELDS: [&str; 3] = ["firstName", "lastName", "dateOfBirth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Nin,
    Bvn,
}

impl IdentityKind {
    pub fn label(self) -> &'static str {
        match self {
            IdentityKind::Nin => "NIN",
            IdentityKind::Bvn => "BVN",
        }
    }
}

/// Outcome of an identity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub message: String,
}

impl IdentityCheck {
    fn passed(data: Option<serde_json::Value>, message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            data,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            data: None,
            message: message.into(),
        }
    }
}

/// Endpoints and credentials for the verification APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_nin_base_url")]
    pub nin_base_url: String,
    #[serde(default)]
    pub nin_api_key: Option<String>,
    #[serde(default = "default_bvn_base_url")]
    pub bvn_base_url: String,
    #[serde(default)]
    pub bvn_api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_nin_base_url() -> String {
    "https://api.nimc.gov.ng/v1".to_string()
}

fn default_bvn_base_url() -> String {
    "https://api.cbn.gov.ng/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nin_base_url: default_nin_base_url(),
            nin_api_key: None,
            bvn_base_url: default_bvn_base_url(),
            bvn_api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    verified: bool,
    data: Option<serde_json::Value>,
}

pub struct IdentityClient {
    http: reqwest::Client,
    config: IdentityConfig,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("farmcred/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn verify_nin(&self, nin: &str) -> IdentityCheck {
        self.check(IdentityKind::Nin, nin).await
    }

    pub async fn verify_bvn(&self, bvn: &str) -> IdentityCheck {
        self.check(IdentityKind::Bvn, bvn).await
    }

    /// Both numbers must verify and the personal data the two services return
    /// must agree on every field they both report.
    pub async fn cross_verify(&self, nin: &str, bvn: &str) -> IdentityCheck {
        let (nin_check, bvn_check) = tokio::join!(self.verify_nin(nin), self.verify_bvn(bvn));
        if !nin_check.is_valid {
            return IdentityCheck::failed(format!("NIN check failed: {}", nin_check.message));
        }
        if !bvn_check.is_valid {
            return IdentityCheck::failed(format!("BVN check failed: {}", bvn_check.message));
        }

        let (Some(nin_data), Some(bvn_data)) = (&nin_check.data, &bvn_check.data) else {
            return IdentityCheck::failed("Verification services returned no personal data");
        };

        let mut compared = 0;
        for field in CROSS_CHECK_FIELDS {
            let (Some(a), Some(b)) = (text_field(nin_data, field), text_field(bvn_data, field))
            else {
                continue;
            };
            compared += 1;
            if !a.eq_ignore_ascii_case(&b) {
                tracing::info!(field, "cross verification mismatch");
                return IdentityCheck::failed(format!("NIN and BVN records disagree on {field}"));
            }
        }
        if compared == 0 {
            return IdentityCheck::failed("No comparable personal data in NIN and BVN records");
        }

        IdentityCheck::passed(
            Some(serde_json::json!({ "nin": nin_data, "bvn": bvn_data })),
            "Identity cross-verification successful",
        )
    }

    async fn check(&self, kind: IdentityKind, number: &str) -> IdentityCheck {
        match self.request(kind, number).await {
            Ok(resp) if resp.verified => {
                tracing::info!(kind = kind.label(), number = %mask(number), "identity verified");
                IdentityCheck::passed(resp.data, format!("{} verified successfully", kind.label()))
            }
            Ok(_) => {
                tracing::info!(kind = kind.label(), number = %mask(number), "identity not verified");
                IdentityCheck::failed(format!("{} could not be verified", kind.label()))
            }
            Err(e) => {
                tracing::warn!(kind = kind.label(), number = %mask(number), %e, "identity check failed");
                IdentityCheck::failed(e.to_string())
            }
        }
    }

    async fn request(
        &self,
        kind: IdentityKind,
        number: &str,
    ) -> Result<VerifyResponse, IdentityError> {
        if !is_valid_identity_number(number) {
            return Err(IdentityError::InvalidFormat(kind.label()));
        }

        let (base_url, api_key, path, body) = match kind {
            IdentityKind::Nin => (
                &self.config.nin_base_url,
                &self.config.nin_api_key,
                "nin/verify",
                serde_json::json!({ "nin": number }),
            ),
            IdentityKind::Bvn => (
                &self.config.bvn_base_url,
                &self.config.bvn_api_key,
                "account/verify",
                serde_json::json!({ "accountNumber": number }),
            ),
        };
        let api_key = api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(IdentityError::NotConfigured(kind.label()))?;
        if base_url.is_empty() {
            return Err(IdentityError::NotConfigured(kind.label()));
        }

        let url = format!("{}/{path}", base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(IdentityError::Api {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json().await?)
    }
}

fn text_field(data: &serde_json::Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
