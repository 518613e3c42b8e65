//! # Docgate Core
//!
//! Resilient access layer for document-platform REST APIs (DocTypes,
//! documents, `/api/resource` + `/api/method` endpoints).
//!
//! ## Overview
//!
//! The upstream platform supports two mutually exclusive authentication
//! schemes, acknowledges creates without a reliable read-after-write
//! guarantee, and exposes the same schema metadata through two structurally
//! different endpoints. This crate absorbs all three quirks:
//!
//! - **Dual-credential channels** behind one [`Channel`] trait
//! - **Create-with-verification** and a bounded retry loop around it
//! - **Heuristic post-write verification** (best-effort, report-valued)
//! - **Schema normalization** across both metadata response shapes
//! - **Structured error translation** so transport internals never leak
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Password-session lifecycle (freshness window, single-flight login) |
//! | [`channel`] | Channel trait and list-query types |
//! | [`channels`] | Token and password channel implementations |
//! | [`client`] | Facade wiring config, channels and operations |
//! | [`config`] | Environment-sourced configuration |
//! | [`documents`] | CRUD/list/call surface with create retry |
//! | [`error`] | Error taxonomy and upstream error translation |
//! | [`http_client`] | HTTP transport abstraction (reqwest or mock) |
//! | [`retry`] | Backoff and retry policy |
//! | [`schema`] | Schema introspection and field-option lookups |
//! | [`verify`] | Post-write verification cascade |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docgate_core::{GateClient, ReqwestHttpClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GateClient::from_env(Arc::new(ReqwestHttpClient::new()));
//!     client.ensure_authenticated().await;
//!
//!     let values = json!({ "description": "file quarterly report" });
//!     let doc = client
//!         .operations()
//!         .create_with_retry("ToDo", values.as_object().expect("object"))
//!         .await?;
//!
//!     println!("created {}", doc["name"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ DocumentOperations   │──────┐
//! │ SchemaService        │      ▼
//! └──────────┬───────────┘  ┌──────────────────┐
//!            │              │ DocumentVerifier │
//!            ▼              └────────┬─────────┘
//! ┌──────────────────────┐           │
//! │ Channel (token or    │◀──────────┘
//! │ password session)    │◀── CredentialManager (password only)
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ HttpClient           │
//! │ (reqwest or mock)    │
//! └──────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Validation failures surface before any network access and are never
//! retried. Transport and server failures always pass through the error
//! translator and carry status, endpoint and a best-effort extracted
//! message. Verification outcomes are report values, not errors.

pub mod auth;
pub mod channel;
pub mod channels;
pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod schema;
pub mod verify;

// Re-export commonly used types at crate root for convenience

pub use auth::{AuthSession, CredentialManager, SESSION_VALIDITY};
pub use channel::{Channel, ChannelFuture, ListQuery, SortOrder};
pub use channels::{PasswordChannel, TokenChannel};
pub use client::GateClient;
pub use config::GateConfig;
pub use documents::{DocumentOperations, ListOptions};
pub use error::{translate, unwrap_nested_json, ChannelError, DocError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use retry::{Backoff, RetryConfig};
pub use schema::{
    CanonicalSchema, FieldDescriptor, FieldOption, NamingMetadata, SchemaFlags, SchemaService,
};
pub use verify::{DocumentVerifier, Verification};
