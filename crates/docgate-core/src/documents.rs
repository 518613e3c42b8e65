//! Public document operations.
//!
//! One implementation parameterized over a [`Channel`] serves both
//! authentication schemes; validation and error translation are identical
//! on either path. Creates additionally drive the verification engine,
//! optionally inside a bounded retry loop. Raw transport errors never
//! escape this module: every non-validation failure passes through
//! [`crate::error::translate`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::channel::{Channel, ListQuery, SortOrder};
use crate::error::{translate, DocError, ValidationError};
use crate::retry::RetryConfig;
use crate::verify::{DocumentVerifier, Verification};

/// Caller-facing list options. `order_by` may carry a trailing direction
/// token (`creation desc`); it is split before reaching the channel.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub fields: Option<Vec<String>>,
    /// Opaque filter payload, forwarded to the channel uninterpreted.
    pub filters: Option<Value>,
    pub limit: Option<u64>,
    pub order_by: Option<String>,
    pub limit_start: Option<u64>,
}

/// CRUD/list/call surface over an authenticated channel.
pub struct DocumentOperations {
    channel: Arc<dyn Channel>,
    verifier: DocumentVerifier,
    retry: RetryConfig,
}

impl DocumentOperations {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            verifier: DocumentVerifier::new(channel.clone()),
            channel,
            retry: RetryConfig::create_policy(),
        }
    }

    /// Override the create retry policy. Mostly useful in tests.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch a document by doctype and name.
    pub async fn get(
        &self,
        doctype: &str,
        name: &str,
        fields: Option<&[String]>,
    ) -> Result<Value, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        require_non_empty(name, ValidationError::EmptyName)?;

        let doc = self
            .channel
            .get_doc(doctype, name, fields)
            .await
            .map_err(|e| translate(e, "get_document"))?;

        if is_absent(&doc) {
            return Err(DocError::NotFound {
                doctype: doctype.to_owned(),
                name: name.to_owned(),
            });
        }
        Ok(doc)
    }

    /// Create a document and verify the write.
    ///
    /// On verified success the created document is returned as-is. An
    /// unverified result is not an error: the document comes back augmented
    /// with a `verification` report and the caller decides how to react.
    pub async fn create(&self, doctype: &str, values: &Map<String, Value>) -> Result<Value, DocError> {
        let (doc, verification) = self.create_verified(doctype, values).await?;
        if verification.success {
            return Ok(doc);
        }

        warn!(doctype, message = %verification.message, "created document could not be verified");
        Ok(annotate_unverified(doc, &verification))
    }

    /// Create with verification inside a bounded retry loop: up to
    /// `max_retries + 1` attempts with backoff delays between them, treating
    /// an unverified result as a retryable condition exactly like a
    /// transport failure. After exhausting attempts the last observed error
    /// is raised.
    ///
    /// A creation response that lacks a document name is retried like any
    /// other unverified outcome, even though a retry cannot change the
    /// response shape; callers relying on that case should use [`create`]
    /// and inspect the report.
    ///
    /// [`create`]: DocumentOperations::create
    pub async fn create_with_retry(
        &self,
        doctype: &str,
        values: &Map<String, Value>,
    ) -> Result<Value, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        if values.is_empty() {
            return Err(ValidationError::EmptyValues.into());
        }

        let mut last_error: Option<DocError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt - 1);
                debug!(doctype, attempt, ?delay, "retrying create after backoff");
                sleep(delay).await;
            }

            match self.create_verified(doctype, values).await {
                Ok((doc, verification)) if verification.success => return Ok(doc),
                Ok((_, verification)) => {
                    warn!(doctype, attempt, message = %verification.message, "create attempt unverified");
                    last_error = Some(DocError::Unverified {
                        doctype: doctype.to_owned(),
                        message: verification.message,
                    });
                }
                // Validation failures are the caller's fault and never retried.
                Err(DocError::Validation(error)) => return Err(error.into()),
                Err(error) => {
                    warn!(doctype, attempt, %error, "create attempt failed");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DocError::Unverified {
            doctype: doctype.to_owned(),
            message: String::from("create retries exhausted"),
        }))
    }

    async fn create_verified(
        &self,
        doctype: &str,
        values: &Map<String, Value>,
    ) -> Result<(Value, Verification), DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        if values.is_empty() {
            return Err(ValidationError::EmptyValues.into());
        }

        let doc = self
            .channel
            .create_doc(doctype, values)
            .await
            .map_err(|e| translate(e, "create_document"))?;

        // Verification runs unconditionally; the upstream acknowledgement
        // alone is not trusted.
        let verification = self.verifier.verify(doctype, values, &doc).await;
        Ok((doc, verification))
    }

    /// Update fields of an existing document.
    ///
    /// No post-write verification is performed for updates; only creates
    /// carry that protection.
    pub async fn update(
        &self,
        doctype: &str,
        name: &str,
        values: &Map<String, Value>,
    ) -> Result<Value, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        require_non_empty(name, ValidationError::EmptyName)?;
        if values.is_empty() {
            return Err(ValidationError::EmptyValues.into());
        }

        self.channel
            .update_doc(doctype, name, values)
            .await
            .map_err(|e| translate(e, "update_document"))
    }

    /// Delete a document, returning the channel's (possibly empty)
    /// acknowledgement unmodified.
    pub async fn delete(&self, doctype: &str, name: &str) -> Result<Value, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        require_non_empty(name, ValidationError::EmptyName)?;

        self.channel
            .delete_doc(doctype, name)
            .await
            .map_err(|e| translate(e, "delete_document"))
    }

    /// List documents of a doctype.
    pub async fn list(&self, doctype: &str, options: ListOptions) -> Result<Vec<Value>, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;

        let (order_by, order) = match options.order_by.as_deref() {
            Some(raw) => {
                let (field, order) = split_order(raw);
                (Some(field), order)
            }
            None => (None, SortOrder::Asc),
        };

        let query = ListQuery {
            fields: options.fields,
            filters: options.filters,
            order_by,
            order,
            limit: options.limit,
            limit_start: options.limit_start,
        };

        self.channel
            .get_doc_list(doctype, query)
            .await
            .map_err(|e| translate(e, "list_documents"))
    }

    /// Invoke a whitelisted remote method.
    pub async fn call_method(&self, method: &str, params: Option<&Value>) -> Result<Value, DocError> {
        require_non_empty(method, ValidationError::EmptyMethod)?;

        self.channel
            .call(method, params)
            .await
            .map_err(|e| translate(e, "call_method"))
    }
}

fn require_non_empty(value: &str, error: ValidationError) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error);
    }
    Ok(())
}

fn is_absent(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Split a trailing ` asc`/` desc` direction token off an order-by
/// expression, defaulting to ascending when absent.
fn split_order(raw: &str) -> (String, SortOrder) {
    let trimmed = raw.trim();
    if let Some((field, direction)) = trimmed.rsplit_once(' ') {
        if direction.eq_ignore_ascii_case("desc") {
            return (field.trim_end().to_owned(), SortOrder::Desc);
        }
        if direction.eq_ignore_ascii_case("asc") {
            return (field.trim_end().to_owned(), SortOrder::Asc);
        }
    }
    (trimmed.to_owned(), SortOrder::Asc)
}

fn annotate_unverified(doc: Value, verification: &Verification) -> Value {
    let report = serde_json::json!({
        "success": verification.success,
        "message": verification.message,
    });

    match doc {
        Value::Object(mut map) => {
            map.insert(String::from("verification"), report);
            Value::Object(map)
        }
        other => serde_json::json!({ "document": other, "verification": report }),
    }
}
