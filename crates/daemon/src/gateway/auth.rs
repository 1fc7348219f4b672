// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission gate (spec §4.10, §8 invariant 8): loopback-only when no token
//! is configured, constant-time bearer-token compare otherwise.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use undoable_core::Clock;
use undoable_wire::ErrorResponse;

use super::SharedState;

pub async fn admission_gate<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    req: Request,
    next: Next,
) -> Response {
    match state.env.settings.token.as_deref() {
        Some(token) => match bearer_token(&req) {
            Some(candidate) if constant_time_eq(candidate.as_bytes(), token.as_bytes()) => next.run(req).await,
            _ => unauthorized("missing or invalid bearer token"),
        },
        None => {
            if request_is_loopback(&req) {
                next.run(req).await
            } else {
                unauthorized("loopback-only mode: configure a bearer token to accept non-loopback requests")
            }
        }
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers().get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn request_is_loopback(req: &Request) -> bool {
    let peer_ok = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().is_loopback())
        .unwrap_or(false);
    peer_ok && forwarded_chain_is_loopback(req)
}

/// A reverse proxy on loopback can still forward a non-loopback client; the
/// whole `X-Forwarded-For` chain must be loopback too, or its absence.
fn forwarded_chain_is_loopback(req: &Request) -> bool {
    let Some(raw) = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok()) else {
        return true;
    };
    raw.split(',').all(|hop| hop.trim().parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message))).into_response()
}
