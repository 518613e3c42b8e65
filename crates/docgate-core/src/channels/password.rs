use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::debug;

use super::RestTransport;
use crate::channel::{Channel, ChannelFuture, ListQuery};
use crate::error::ChannelError;
use crate::http_client::{HttpAuth, HttpClient, HttpResponse};

/// Stateful password-session channel.
///
/// [`Channel::login`] establishes an upstream session and captures the
/// session cookie from the response; subsequent requests carry that cookie.
/// Session freshness and single-flight login are the
/// [`crate::auth::CredentialManager`]'s job, not this channel's.
pub struct PasswordChannel {
    transport: RestTransport,
    session_cookie: Mutex<Option<String>>,
}

impl PasswordChannel {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, team: Option<String>) -> Self {
        Self {
            transport: RestTransport::new(http, base_url, team),
            session_cookie: Mutex::new(None),
        }
    }

    fn auth(&self) -> HttpAuth {
        let guard = self
            .session_cookie
            .lock()
            .expect("session cookie lock poisoned");
        match guard.as_ref() {
            Some(cookie) => HttpAuth::Cookie(cookie.clone()),
            None => HttpAuth::None,
        }
    }

    fn store_cookie(&self, cookie: String) {
        let mut guard = self
            .session_cookie
            .lock()
            .expect("session cookie lock poisoned");
        *guard = Some(cookie);
    }

    /// Extract the session id from newline-joined `set-cookie` headers.
    /// A `Guest` session means the login did not actually authenticate.
    fn session_cookie_from(response: &HttpResponse) -> Option<String> {
        let raw = response.header("set-cookie")?;
        for line in raw.lines() {
            let first = line.split(';').next()?.trim();
            if let Some(value) = first.strip_prefix("sid=") {
                if !value.is_empty() && value != "Guest" {
                    return Some(format!("sid={value}"));
                }
            }
        }
        None
    }
}

impl Channel for PasswordChannel {
    fn get_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        fields: Option<&'a [String]>,
    ) -> ChannelFuture<'a, Value> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.get_doc(&auth, doctype, name, fields).await
        })
    }

    fn create_doc<'a>(
        &'a self,
        doctype: &'a str,
        values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.create_doc(&auth, doctype, values).await
        })
    }

    fn update_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.update_doc(&auth, doctype, name, values).await
        })
    }

    fn delete_doc<'a>(&'a self, doctype: &'a str, name: &'a str) -> ChannelFuture<'a, Value> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.delete_doc(&auth, doctype, name).await
        })
    }

    fn get_doc_list<'a>(&'a self, doctype: &'a str, query: ListQuery) -> ChannelFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.get_doc_list(&auth, doctype, &query).await
        })
    }

    fn call<'a>(&'a self, method: &'a str, params: Option<&'a Value>) -> ChannelFuture<'a, Value> {
        Box::pin(async move {
            let auth = self.auth();
            self.transport.call(&auth, method, params).await
        })
    }

    fn login<'a>(&'a self, username: &'a str, password: &'a str) -> ChannelFuture<'a, ()> {
        Box::pin(async move {
            let response = self.transport.login(username, password).await?;

            match Self::session_cookie_from(&response) {
                Some(cookie) => {
                    debug!(username, "password session established");
                    self.store_cookie(cookie);
                    Ok(())
                }
                None => Err(ChannelError::decode(
                    self.transport.method_url("login"),
                    "login response did not set a session cookie",
                )),
            }
        })
    }
}
