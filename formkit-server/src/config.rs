//! Server configuration from the environment.

use std::path::PathBuf;

/// Default port for the form server.
pub const DEFAULT_PORT: u16 = 9474;

/// Environment variable holding the listen port.
pub const PORT_VAR: &str = "FORMKIT_PORT";

/// Environment variable holding the schema file path.
pub const SCHEMAS_VAR: &str = "FORMKIT_SCHEMAS";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to bind on localhost.
    pub port: u16,
    /// JSON file mapping form id to schema.
    pub schemas_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            schemas_path: None,
        }
    }
}

impl ServerConfig {
    /// Read `FORMKIT_PORT` and `FORMKIT_SCHEMAS`.
    ///
    /// An unparsable port falls back to [`DEFAULT_PORT`] with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = match lookup(PORT_VAR) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid {PORT_VAR}, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let schemas_path = lookup(SCHEMAS_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self { port, schemas_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), ServerConfig::default());
    }

    #[test]
    fn test_reads_port_and_schemas() {
        let cfg = config(&[(PORT_VAR, "8088"), (SCHEMAS_VAR, "/etc/formkit/forms.json")]);
        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.schemas_path, Some(PathBuf::from("/etc/formkit/forms.json")));
    }

    #[test]
    fn test_bad_port_falls_back() {
        assert_eq!(config(&[(PORT_VAR, "http")]).port, DEFAULT_PORT);
        assert_eq!(config(&[(SCHEMAS_VAR, "  ")]).schemas_path, None);
    }
}
