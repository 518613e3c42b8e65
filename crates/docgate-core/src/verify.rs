//! Post-write verification engine.
//!
//! The upstream platform acknowledges creates without a transactional
//! read-after-write guarantee, so this cascade approximates confirmation
//! rather than proving it. The outcome is a report value, never an error:
//! "write acknowledged but unconfirmed" is a different signal than genuine
//! failure, and the caller decides how to react.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::channel::{Channel, ListQuery};

/// Maximum documents fetched by the filter-search step.
const FILTER_SEARCH_LIMIT: u64 = 5;

/// Prefix length used for the `description` contains-match.
const DESCRIPTION_PREFIX_LEN: usize = 20;

/// Ordered cascade of discriminating fields, most discriminating first.
/// Each entry pairs the field to probe in the submitted values with a
/// builder producing the upstream filter for that field.
const FILTER_CASCADE: &[(&str, fn(&str) -> Value)] = &[
    ("name", |value| json!({ "name": value })),
    ("title", |value| json!({ "title": value })),
    ("description", |value| {
        let prefix: String = value.chars().take(DESCRIPTION_PREFIX_LEN).collect();
        json!({ "description": ["like", format!("%{prefix}%")] })
    }),
];

/// Verification outcome: a report value accompanying otherwise-successful
/// data, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub message: String,
}

impl Verification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Decides, post-write, whether a document actually exists upstream.
pub struct DocumentVerifier {
    channel: Arc<dyn Channel>,
}

impl DocumentVerifier {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Evaluate the verification cascade, stopping at the first conclusive
    /// step:
    ///
    /// 1. no `name` in the creation response: failure;
    /// 2. direct fetch by name with a matching name: success;
    /// 3. filter search on the most discriminating submitted field: success
    ///    on a name match, failure otherwise (distinguishing "results but
    ///    no match" from "no results");
    /// 4. no discriminating field available: failure.
    pub async fn verify(
        &self,
        doctype: &str,
        values: &Map<String, Value>,
        creation_response: &Value,
    ) -> Verification {
        let expected = creation_response
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());
        let Some(expected) = expected else {
            return Verification::failure("creation response lacks a document name");
        };

        match self.channel.get_doc(doctype, expected, None).await {
            Ok(doc) if doc.get("name").and_then(Value::as_str) == Some(expected) => {
                return Verification::success("verified by direct fetch");
            }
            Ok(_) => {
                debug!(doctype, name = expected, "direct fetch returned a different document");
            }
            Err(error) => {
                debug!(doctype, name = expected, %error, "direct fetch failed, trying filter search");
            }
        }

        let Some((field, filter)) = discriminating_filter(values) else {
            return Verification::failure("could not verify creation - no suitable filters available");
        };

        let query = ListQuery::default()
            .with_fields(["name"])
            .with_filters(filter)
            .with_limit(FILTER_SEARCH_LIMIT);

        match self.channel.get_doc_list(doctype, query).await {
            Ok(docs) if docs.is_empty() => {
                Verification::failure("no documents found matching filters")
            }
            Ok(docs) => {
                let matched = docs
                    .iter()
                    .any(|doc| doc.get("name").and_then(Value::as_str) == Some(expected));
                if matched {
                    Verification::success("verified by filter search")
                } else {
                    Verification::failure(format!(
                        "found {} document(s) matching '{field}' but none named '{expected}'",
                        docs.len()
                    ))
                }
            }
            Err(error) => Verification::failure(format!("filter search failed: {error}")),
        }
    }
}

/// Pick the most discriminating available field from the submitted values,
/// in cascade priority order.
fn discriminating_filter(values: &Map<String, Value>) -> Option<(&'static str, Value)> {
    for (field, build) in FILTER_CASCADE {
        if let Some(value) = values.get(*field).and_then(Value::as_str) {
            if !value.is_empty() {
                return Some((field, build(value)));
            }
        }
    }
    None
}
