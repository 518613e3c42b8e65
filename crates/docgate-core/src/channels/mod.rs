//! Channel implementations for the two platform authentication schemes.
//!
//! Both channels share the same REST plumbing ([`RestTransport`]): URL
//! construction, the tenant header, envelope unwrapping, and error mapping.
//! They differ only in the [`HttpAuth`] they attach to each request.

mod password;
mod token;

pub use password::PasswordChannel;
pub use token::TokenChannel;

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::channel::ListQuery;
use crate::error::ChannelError;
use crate::http_client::{HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Header carrying the tenant/team identifier on every outgoing request.
const TEAM_HEADER: &str = "x-team";

/// Shared REST plumbing used by both channel implementations.
pub(crate) struct RestTransport {
    http: Arc<dyn HttpClient>,
    base_url: String,
    team: Option<String>,
}

impl RestTransport {
    pub(crate) fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, team: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url, team }
    }

    pub(crate) fn resource_url(&self, doctype: &str, name: Option<&str>) -> String {
        match name {
            Some(name) => format!(
                "{}/api/resource/{}/{}",
                self.base_url,
                urlencoding::encode(doctype),
                urlencoding::encode(name)
            ),
            None => format!("{}/api/resource/{}", self.base_url, urlencoding::encode(doctype)),
        }
    }

    pub(crate) fn method_url(&self, method: &str) -> String {
        format!("{}/api/method/{}", self.base_url, method)
    }

    fn list_url(&self, doctype: &str, query: &ListQuery) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(fields) = &query.fields {
            pairs.push(("fields", Value::from(fields.clone()).to_string()));
        }
        if let Some(filters) = &query.filters {
            pairs.push(("filters", filters.to_string()));
        }
        if let Some(field) = &query.order_by {
            pairs.push(("order_by", format!("{field} {}", query.order.as_str())));
        }
        if let Some(limit) = query.limit {
            pairs.push(("limit_page_length", limit.to_string()));
        }
        if let Some(start) = query.limit_start {
            pairs.push(("limit_start", start.to_string()));
        }

        let mut url = self.resource_url(doctype, None);
        if !pairs.is_empty() {
            let encoded: Vec<String> = pairs
                .iter()
                .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
                .collect();
            url.push('?');
            url.push_str(&encoded.join("&"));
        }
        url
    }

    /// Send a request with the given auth attached, mapping transport and
    /// status failures into [`ChannelError`].
    pub(crate) async fn send(
        &self,
        mut request: HttpRequest,
        auth: &HttpAuth,
    ) -> Result<HttpResponse, ChannelError> {
        if let Some(team) = &self.team {
            request = request.with_header(TEAM_HEADER, team);
        }
        request = request.with_auth(auth);

        let endpoint = request.url.clone();
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ChannelError::transport(&endpoint, e.message(), e.retryable()))?;

        if !response.is_success() {
            return Err(ChannelError::status(&endpoint, response.status, response.body));
        }
        Ok(response)
    }

    /// Parse a response body and unwrap the platform envelope: resource
    /// endpoints wrap payloads under `data`, method endpoints under
    /// `message`. Bodies without the expected wrapper pass through whole.
    fn unwrap_envelope(endpoint: &str, body: &str, key: &str) -> Result<Value, ChannelError> {
        let mut payload: Value = serde_json::from_str(body)
            .map_err(|e| ChannelError::decode(endpoint, format!("invalid JSON response: {e}")))?;

        match payload.get_mut(key) {
            Some(inner) => Ok(inner.take()),
            None => Ok(payload),
        }
    }

    pub(crate) async fn get_doc(
        &self,
        auth: &HttpAuth,
        doctype: &str,
        name: &str,
        fields: Option<&[String]>,
    ) -> Result<Value, ChannelError> {
        let mut url = self.resource_url(doctype, Some(name));
        if let Some(fields) = fields {
            let encoded = Value::from(fields.to_vec()).to_string();
            url.push_str(&format!("?fields={}", urlencoding::encode(&encoded)));
        }

        let response = self.send(HttpRequest::get(&url), auth).await?;
        Self::unwrap_envelope(&url, &response.body, "data")
    }

    pub(crate) async fn create_doc(
        &self,
        auth: &HttpAuth,
        doctype: &str,
        values: &Map<String, Value>,
    ) -> Result<Value, ChannelError> {
        let url = self.resource_url(doctype, None);
        let request = HttpRequest::post(&url).with_json(&Value::Object(values.clone()));
        let response = self.send(request, auth).await?;
        Self::unwrap_envelope(&url, &response.body, "data")
    }

    pub(crate) async fn update_doc(
        &self,
        auth: &HttpAuth,
        doctype: &str,
        name: &str,
        values: &Map<String, Value>,
    ) -> Result<Value, ChannelError> {
        let url = self.resource_url(doctype, Some(name));
        let request =
            HttpRequest::new(HttpMethod::Put, &url).with_json(&Value::Object(values.clone()));
        let response = self.send(request, auth).await?;
        Self::unwrap_envelope(&url, &response.body, "data")
    }

    pub(crate) async fn delete_doc(
        &self,
        auth: &HttpAuth,
        doctype: &str,
        name: &str,
    ) -> Result<Value, ChannelError> {
        let url = self.resource_url(doctype, Some(name));
        let response = self.send(HttpRequest::new(HttpMethod::Delete, &url), auth).await?;

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Self::unwrap_envelope(&url, &response.body, "message")
    }

    pub(crate) async fn get_doc_list(
        &self,
        auth: &HttpAuth,
        doctype: &str,
        query: &ListQuery,
    ) -> Result<Vec<Value>, ChannelError> {
        let url = self.list_url(doctype, query);
        let response = self.send(HttpRequest::get(&url), auth).await?;
        let data = Self::unwrap_envelope(&url, &response.body, "data")?;

        match data {
            Value::Array(items) => Ok(items),
            other => Err(ChannelError::decode(
                &url,
                format!("expected a document array, got {}", value_kind(&other)),
            )),
        }
    }

    pub(crate) async fn call(
        &self,
        auth: &HttpAuth,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Value, ChannelError> {
        let url = self.method_url(method);
        let request = match params {
            Some(params) => HttpRequest::post(&url).with_json(params),
            None => HttpRequest::post(&url).with_json(&json!({})),
        };
        let response = self.send(request, auth).await?;
        Self::unwrap_envelope(&url, &response.body, "message")
    }

    pub(crate) async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<HttpResponse, ChannelError> {
        let url = self.method_url("login");
        let request = HttpRequest::post(&url).with_json(&json!({ "usr": username, "pwd": password }));
        self.send(request, &HttpAuth::None).await
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
