//! Channel trait and request types.
//!
//! A [`Channel`] is an authenticated transport performing document CRUD and
//! remote-method calls against the upstream platform. Two implementations
//! exist (see [`crate::channels`]): a stateless token channel and a stateful
//! password-session channel. Everything above this trait is agnostic to
//! which authentication scheme is in play.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::error::ChannelError;

pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChannelError>> + Send + 'a>>;

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Query options for [`Channel::get_doc_list`].
///
/// `filters` is forwarded opaquely: an equality map, an operator-tuple map,
/// or an ordered array of OR-triples, exactly as the caller supplied it.
/// This layer never interprets filter semantics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQuery {
    pub fields: Option<Vec<String>>,
    pub filters: Option<Value>,
    /// Bare field name; the direction travels separately in `order`.
    pub order_by: Option<String>,
    pub order: SortOrder,
    pub limit: Option<u64>,
    pub limit_start: Option<u64>,
}

impl ListQuery {
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Authenticated transport abstraction over the upstream platform.
///
/// Implementations must be `Send + Sync`; they are shared across tasks
/// behind an `Arc`.
pub trait Channel: Send + Sync {
    /// Fetch a single document, optionally restricted to named fields.
    fn get_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        fields: Option<&'a [String]>,
    ) -> ChannelFuture<'a, Value>;

    /// Create a document; the upstream assigns the name unless one is supplied.
    fn create_doc<'a>(
        &'a self,
        doctype: &'a str,
        values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value>;

    /// Update fields of an existing document.
    fn update_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value>;

    /// Delete a document; returns the upstream acknowledgement as-is.
    fn delete_doc<'a>(&'a self, doctype: &'a str, name: &'a str) -> ChannelFuture<'a, Value>;

    /// List documents of a doctype.
    fn get_doc_list<'a>(&'a self, doctype: &'a str, query: ListQuery) -> ChannelFuture<'a, Vec<Value>>;

    /// Invoke a whitelisted remote method.
    fn call<'a>(&'a self, method: &'a str, params: Option<&'a Value>) -> ChannelFuture<'a, Value>;

    /// Establish an upstream session. A no-op for channels that are
    /// authenticated by construction.
    fn login<'a>(&'a self, username: &'a str, password: &'a str) -> ChannelFuture<'a, ()>;
}
