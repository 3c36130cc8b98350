//! Registration HTTP Protocol
//!
//! API endpoints and the JSON bodies exchanged with clients. Field names are
//! camelCase on the wire (`memberCode`, `sponsorCode`, `leftCount`).

use serde::{Deserialize, Serialize};

use crate::tree::audit::CountMismatch;
use crate::tree::types::{Participant, ParticipantSummary, Side};

// --- API Endpoints ---

/// Public endpoint for new registrations.
pub const ENDPOINT_REGISTER: &str = "/api/register";
/// Profile of one participant, keyed by member code.
pub const ENDPOINT_PROFILE: &str = "/api/profile";
/// Left/right downline lists of one participant.
pub const ENDPOINT_DOWNLINE: &str = "/api/downline";
/// Internal endpoint recounting a subtree and reporting stale counters.
pub const ENDPOINT_AUDIT: &str = "/internal/audit";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    /// Required for every registration except the very first.
    #[serde(default)]
    pub sponsor_code: Option<String>,
    #[serde(default)]
    pub position: Option<Side>,
}

impl RegisterRequest {
    /// Shape checks only; sponsor existence is decided by the service.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("mobile", &self.mobile),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{} is required", field));
            }
        }
        if !self.email.contains('@') {
            return Err("email is not valid".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub member_code: Option<String>,
    #[serde(default)]
    pub is_root: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub member_code: String,
    pub sponsor_code: String,
    pub left_count: u64,
    pub right_count: u64,
}

impl From<Participant> for ProfileResponse {
    fn from(p: Participant) -> Self {
        Self {
            name: p.name,
            email: p.email,
            mobile: p.mobile,
            member_code: p.member_code.0,
            sponsor_code: p.sponsor_code,
            left_count: p.left_count,
            right_count: p.right_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownlineResponse {
    pub left_members: Vec<ParticipantSummary>,
    pub right_members: Vec<ParticipantSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub member_code: String,
    pub consistent: bool,
    pub mismatches: Vec<CountMismatch>,
}

/// Body returned alongside any non-2xx status on read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
