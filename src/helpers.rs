//! Shared helper functions for handlers.

use axum::{
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

use crate::auth::jwt::Claims;
use crate::error::ApiError;

pub fn current_user_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid token subject", "INVALID_TOKEN"))
}

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), (StatusCode, Json<ApiError>)> {
    payload.validate().map_err(|e| {
        ApiError::bad_request(format!("Validation error: {}", e), "VALIDATION_ERROR")
    })
}

/// First hop of `X-Forwarded-For`, else the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(512).collect())
}
