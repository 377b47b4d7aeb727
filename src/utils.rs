use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Creates a truncated, salted hash of an identifier for safe logging.
///
/// # Arguments
/// * `id` - The identifier to hash (e.g., user_id, client address).
/// * `salt` - A salt value from the application's configuration.
///
/// # Returns
/// A short, hexadecimal string representing the salted hash.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    hash[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Extracts the client address a request should be accounted to
///
/// With `trust_forwarded` set, checks in order:
/// 1. X-Forwarded-For (first IP in the chain)
/// 2. X-Real-IP
///
/// then falls back to the direct connection IP, and finally to `"unknown"`
/// so that every unattributable request shares one bucket.
///
/// # Security Note
/// Forwarding headers are client-controlled unless a reverse proxy overwrites
/// them. Leave `trust_forwarded` off when the server is reachable directly.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(forwarded_for) = headers.get("x-forwarded-for")
            && let Ok(forwarded_str) = forwarded_for.to_str()
            && let Some(first_ip) = forwarded_str.split(',').next()
            && let Ok(ip) = first_ip.trim().parse::<IpAddr>()
        {
            return normalize_ip(ip);
        }

        if let Some(real_ip) = headers.get("x-real-ip")
            && let Ok(real_ip_str) = real_ip.to_str()
            && let Ok(ip) = real_ip_str.trim().parse::<IpAddr>()
        {
            return normalize_ip(ip);
        }
    }

    match direct_ip {
        Some(ip) => normalize_ip(ip),
        None => "unknown".to_string(),
    }
}

/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) collapse to plain IPv4 so a
/// dual-stack listener does not split one client across two buckets.
fn normalize_ip(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}
