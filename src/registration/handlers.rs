use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::protocol::{
    AuditResponse, DownlineResponse, ErrorResponse, ProfileResponse, RegisterRequest,
    RegisterResponse,
};
use super::service::{NewRegistration, ReferralService};
use crate::storage::store::StoreError;
use crate::tree::error::TreeError;
use crate::tree::types::MemberCode;

type ErrorReply = (StatusCode, Json<ErrorResponse>);

pub fn status_for(error: &TreeError) -> StatusCode {
    match error {
        TreeError::InvalidSponsor(_)
        | TreeError::MissingSide
        | TreeError::NoAvailablePosition { .. }
        | TreeError::EmailTaken(_) => StatusCode::BAD_REQUEST,
        TreeError::Store(StoreError::DuplicateIndexKey { .. }) => StatusCode::BAD_REQUEST,
        TreeError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        TreeError::PropagationIncomplete { .. } | TreeError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_reply(error: TreeError) -> ErrorReply {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Request rejected: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub async fn handle_health() -> &'static str {
    "Referral tree service is running"
}

pub async fn handle_register(
    Extension(service): Extension<Arc<ReferralService>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    if let Err(message) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                message,
                member_code: None,
                is_root: false,
            }),
        );
    }

    let registration = NewRegistration {
        name: req.name,
        email: req.email,
        mobile: req.mobile,
        password: req.password,
        sponsor_code: req.sponsor_code,
        side: req.position,
    };

    match service.register(registration).await {
        Ok(registered) => {
            let message = if registered.is_root {
                "Root user registration successful"
            } else {
                "Registration successful"
            };
            (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    success: true,
                    message: message.to_string(),
                    member_code: Some(registered.member_code.0),
                    is_root: registered.is_root,
                }),
            )
        }
        Err(e) => {
            let status = status_for(&e);
            // The participant exists even though some counters were not updated.
            let member_code = match &e {
                TreeError::PropagationIncomplete { member_code, .. } => Some(member_code.0.clone()),
                _ => None,
            };
            if status.is_server_error() {
                tracing::error!("Registration error: {}", e);
            }
            (
                status,
                Json(RegisterResponse {
                    success: false,
                    message: e.to_string(),
                    member_code,
                    is_root: false,
                }),
            )
        }
    }
}

pub async fn handle_get_profile(
    Extension(service): Extension<Arc<ReferralService>>,
    Path(code): Path<String>,
) -> Result<Json<ProfileResponse>, ErrorReply> {
    service
        .get_profile(&MemberCode(code))
        .await
        .map(|participant| Json(participant.into()))
        .map_err(error_reply)
}

pub async fn handle_get_downline(
    Extension(service): Extension<Arc<ReferralService>>,
    Path(code): Path<String>,
) -> Result<Json<DownlineResponse>, ErrorReply> {
    let downline = service
        .get_downline(&MemberCode(code))
        .await
        .map_err(error_reply)?;

    Ok(Json(DownlineResponse {
        left_members: downline.left_members,
        right_members: downline.right_members,
    }))
}

pub async fn handle_audit(
    Extension(service): Extension<Arc<ReferralService>>,
    Path(code): Path<String>,
) -> Result<Json<AuditResponse>, ErrorReply> {
    let mismatches = service
        .audit(&MemberCode(code.clone()))
        .await
        .map_err(error_reply)?;

    Ok(Json(AuditResponse {
        member_code: code,
        consistent: mismatches.is_empty(),
        mismatches,
    }))
}
