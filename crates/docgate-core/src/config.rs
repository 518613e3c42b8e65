//! Environment-sourced configuration.
//!
//! Read once at process start; nothing in this crate re-reads the
//! environment after construction.

use std::env;

/// Connection and credential settings for the upstream platform.
///
/// The two credential pairs select the authentication scheme: API
/// key/secret drive the stateless token channel, username/password the
/// stateful session channel. `team` is a tenant identifier attached as a
/// header to every outgoing request.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub team: Option<String>,
}

impl GateConfig {
    /// Load configuration from `DOCGATE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("DOCGATE_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| String::from("http://localhost:8000")),
            api_key: non_empty_var("DOCGATE_API_KEY"),
            api_secret: non_empty_var("DOCGATE_API_SECRET"),
            username: non_empty_var("DOCGATE_USERNAME"),
            password: non_empty_var("DOCGATE_PASSWORD"),
            team: non_empty_var("DOCGATE_TEAM"),
        }
    }

    pub fn has_token_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    pub fn has_password_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_predicates_require_both_halves() {
        let mut config = GateConfig {
            base_url: String::from("http://localhost:8000"),
            api_key: Some(String::from("key")),
            ..GateConfig::default()
        };
        assert!(!config.has_token_credentials());

        config.api_secret = Some(String::from("secret"));
        assert!(config.has_token_credentials());

        config.username = Some(String::from("admin"));
        assert!(!config.has_password_credentials());
        config.password = Some(String::from("pw"));
        assert!(config.has_password_credentials());
    }
}
