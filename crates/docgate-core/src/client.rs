//! Client facade wiring configuration, channels and operations together.

use std::sync::Arc;

use tracing::debug;

use crate::auth::CredentialManager;
use crate::channel::Channel;
use crate::channels::{PasswordChannel, TokenChannel};
use crate::config::GateConfig;
use crate::documents::DocumentOperations;
use crate::http_client::HttpClient;
use crate::schema::SchemaService;

/// Entry point composing the access layer from configuration.
///
/// The authentication scheme is chosen once, at construction: API
/// key/secret select the stateless token channel; otherwise the stateful
/// password channel is used and a [`CredentialManager`] drives its session
/// lifecycle.
pub struct GateClient {
    operations: DocumentOperations,
    schema: SchemaService,
    credentials: Option<Arc<CredentialManager>>,
}

impl GateClient {
    pub fn from_env(http: Arc<dyn HttpClient>) -> Self {
        Self::from_config(GateConfig::from_env(), http)
    }

    pub fn from_config(config: GateConfig, http: Arc<dyn HttpClient>) -> Self {
        let (channel, credentials): (Arc<dyn Channel>, Option<Arc<CredentialManager>>) =
            if config.has_token_credentials() {
                debug!("using token channel");
                let channel = Arc::new(TokenChannel::new(
                    http,
                    config.base_url.clone(),
                    config.api_key.clone().unwrap_or_default(),
                    config.api_secret.clone().unwrap_or_default(),
                    config.team.clone(),
                ));
                (channel, None)
            } else {
                debug!("using password channel");
                let channel: Arc<dyn Channel> = Arc::new(PasswordChannel::new(
                    http,
                    config.base_url.clone(),
                    config.team.clone(),
                ));
                let manager = Arc::new(CredentialManager::new(
                    channel.clone(),
                    config.username.clone(),
                    config.password.clone(),
                ));
                (channel, Some(manager))
            };

        Self {
            operations: DocumentOperations::new(channel.clone()),
            schema: SchemaService::new(channel),
            credentials,
        }
    }

    pub fn operations(&self) -> &DocumentOperations {
        &self.operations
    }

    pub fn schema(&self) -> &SchemaService {
        &self.schema
    }

    /// Make sure the active channel is usable. The token channel is
    /// authenticated by construction; the password channel authenticates
    /// (or reuses a fresh session) through its credential manager.
    pub async fn ensure_authenticated(&self) -> bool {
        match &self.credentials {
            None => true,
            Some(manager) => manager.authenticate_with_password().await,
        }
    }
}
