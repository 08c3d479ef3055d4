//! `GET /ip`: echo the caller's apparent address and user agent.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::response::{IntoResponse, Json};
use http::header::{HeaderMap, USER_AGENT};
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "unknown";
const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub ip: String,
    pub user_agent: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Pick the client address: first forwarded-for entry, then the real-ip
/// header, then the transport peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = header_str(headers, FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string);

    let ip = forwarded
        .or_else(|| header_str(headers, REAL_IP).map(str::to_string))
        .or_else(|| peer.map(|addr| addr.ip().to_string()));

    match ip {
        Some(ip) => strip_ipv4_mapped(&ip).to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// `::ffff:203.0.113.5` becomes `203.0.113.5`; anything else is untouched.
pub fn strip_ipv4_mapped(ip: &str) -> &str {
    ip.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(ip)
}

pub fn resolve_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> ClientIdentity {
    ClientIdentity {
        ip: resolve_client_ip(headers, peer),
        user_agent: header_str(headers, USER_AGENT.as_str())
            .unwrap_or(UNKNOWN)
            .to_string(),
    }
}

pub async fn client_identity(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    Json(resolve_identity(&headers, peer))
}
