use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::client::ClientConfig;
use crate::error::{Error, Result};

/// Production registry endpoint.
pub const REGISTRY_URL: &str = "https://registry.o2a-data.de/rest/v2";

/// Production data-web-service endpoint.
pub const DWS_URL: &str = "https://dashboard.awi.de/data/rest";

/// Sandbox registry endpoint, for experiments against non-production data.
pub const SANDBOX_REGISTRY_URL: &str = "https://registry.sandbox.o2a-data.de/rest/v2";

/// API credentials as issued by the registry token page.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

pub(crate) fn load_config(
    registry_url: Option<String>,
    dws_url: Option<String>,
) -> Result<ClientConfig> {
    let registry_url = registry_url
        .or_else(|| std::env::var("O2A_REGISTRY_URL").ok())
        .unwrap_or_else(|| REGISTRY_URL.to_string());
    let dws_url = dws_url
        .or_else(|| std::env::var("O2A_DWS_URL").ok())
        .unwrap_or_else(|| DWS_URL.to_string());

    let mut credentials = None;
    for candidate in credential_candidates() {
        if candidate.exists() {
            credentials = Some(read_credentials(&candidate)?);
            break;
        }
    }

    Ok(ClientConfig {
        registry_url,
        dws_url,
        credentials,
    })
}

fn read_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        context: format!("credentials file {}", path.display()),
        source,
    })
}

fn credential_candidates() -> Vec<PathBuf> {
    // Search order:
    // 1) O2A_CREDENTIALS (explicit)
    // 2) ./.o2arc (current working directory)
    // 3) ~/.o2arc
    if let Ok(path) = std::env::var("O2A_CREDENTIALS") {
        return vec![PathBuf::from(path)];
    }

    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(".o2arc"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".o2arc"));
    }
    candidates
}
