//! Token login against the registry auth service.
//!
//! Interactive accounts create an API token at o2a-data.de; the login
//! endpoint exchanges email and token for a session cookie that authorizes
//! write access (POST/PUT/DELETE) on the registry.

use log::debug;
use reqwest::blocking::Client as HttpClient;

use crate::config::Credentials;
use crate::error::{Error, Result};

/// Session-cookie name issued by the registry login endpoint, also accepted
/// as a request header on subsequent calls.
pub(crate) const AUTH_HEADER: &str = "x-auth-token";

/// Derives the login URL for a registry base URL. The sandbox serves its
/// auth endpoint under the REST root; production runs a separate auth
/// service next to it.
pub(crate) fn auth_url(registry_url: &str) -> String {
    let base = registry_url.trim_end_matches('/');
    if base.contains("sandbox") {
        return format!("{}/auth/login", base);
    }
    match base.find("/rest/") {
        Some(idx) => format!("{}/auth/rest/login", &base[..idx]),
        None => format!("{}/auth/login", base),
    }
}

/// Exchanges credentials for a session token.
pub(crate) fn login(
    http: &HttpClient,
    registry_url: &str,
    credentials: &Credentials,
) -> Result<String> {
    let url = auth_url(registry_url);
    debug!("POST {url}");

    let response = http
        .post(&url)
        .header("accept", "*/*")
        .form(&[
            ("username", credentials.email.as_str()),
            ("password", credentials.token.as_str()),
        ])
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Transport {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            url,
        });
    }

    response
        .cookies()
        .find(|cookie| cookie.name() == AUTH_HEADER)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| Error::Auth(format!("no {AUTH_HEADER} cookie in login response")))
}
