//! Client registry: which tenants get analyzed, and where their data lives.
//!
//! The registry is a YAML file maintained by an external administration
//! process. It is re-read at the start of every sync run so enable/disable
//! and source changes take effect without a restart.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One tenant's analysis target, read-only to the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Stable external identifier; never changes for the life of the client.
    pub client_id: String,
    pub display_name: String,
    /// Opaque reference resolved by the source adapter (a sheet identifier).
    pub source_ref: String,
    /// Name of the credential entry (env var) holding the source token.
    pub credentials_ref: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    clients: Vec<serde_yaml::Value>,
}

/// Load the enabled clients from the registry file, sorted by `client_id`.
///
/// Entries that fail to deserialize, have an empty `client_id`, or repeat an
/// already-seen `client_id` are skipped with a warning — one malformed entry
/// must not block the rest of the registry. An empty or fully-disabled
/// registry yields `Ok(vec![])`, not an error.
///
/// # Errors
///
/// Returns [`ConfigError::RegistryIo`] if the file cannot be read, or
/// [`ConfigError::RegistryParse`] if the top-level document is not a
/// `clients:` sequence.
pub fn load_enabled_clients(path: &Path) -> Result<Vec<ClientConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RegistryIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let registry: RegistryFile = serde_yaml::from_str(&content)?;
    Ok(enabled_clients_from_entries(registry.clients))
}

/// Filter, validate, deduplicate, and sort raw registry entries.
fn enabled_clients_from_entries(entries: Vec<serde_yaml::Value>) -> Vec<ClientConfig> {
    let mut seen_ids = std::collections::HashSet::new();
    let mut clients: Vec<ClientConfig> = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let client: ClientConfig = match serde_yaml::from_value(entry) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed client registry entry");
                continue;
            }
        };

        if client.client_id.trim().is_empty() {
            tracing::warn!(index, "skipping client registry entry with empty client_id");
            continue;
        }

        if !seen_ids.insert(client.client_id.clone()) {
            tracing::warn!(
                client = %client.client_id,
                "skipping duplicate client registry entry"
            );
            continue;
        }

        if !client.enabled {
            tracing::debug!(client = %client.client_id, "client disabled; excluded from run");
            continue;
        }

        clients.push(client);
    }

    // Deterministic ordering for reproducible run logs.
    clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
    clients
}
