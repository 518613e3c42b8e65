//! Shared test support: a scriptable, recording channel mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use docgate_core::{Channel, ChannelError, ChannelFuture, ListQuery};
use serde_json::{Map, Value};

/// One observed channel call, recorded in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    GetDoc { doctype: String, name: String },
    CreateDoc { doctype: String },
    UpdateDoc { doctype: String, name: String },
    DeleteDoc { doctype: String, name: String },
    List { doctype: String, query: ListQuery },
    Call { method: String },
    Login { username: String },
}

/// Scriptable channel: each operation pops its next queued response, and
/// every call is recorded for assertions. An empty queue yields an error so
/// unscripted traffic fails loudly instead of silently succeeding.
#[derive(Default)]
pub struct MockChannel {
    pub get_doc_responses: Mutex<VecDeque<Result<Value, ChannelError>>>,
    pub create_responses: Mutex<VecDeque<Result<Value, ChannelError>>>,
    pub update_responses: Mutex<VecDeque<Result<Value, ChannelError>>>,
    pub delete_responses: Mutex<VecDeque<Result<Value, ChannelError>>>,
    pub list_responses: Mutex<VecDeque<Result<Vec<Value>, ChannelError>>>,
    pub call_responses: Mutex<VecDeque<Result<Value, ChannelError>>>,
    pub login_results: Mutex<VecDeque<Result<(), ChannelError>>>,
    /// Simulated login round-trip time; lets concurrency tests overlap.
    pub login_delay: Option<Duration>,
    pub login_count: AtomicUsize,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_get_doc(&self, response: Result<Value, ChannelError>) {
        self.get_doc_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_create(&self, response: Result<Value, ChannelError>) {
        self.create_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_update(&self, response: Result<Value, ChannelError>) {
        self.update_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_delete(&self, response: Result<Value, ChannelError>) {
        self.delete_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_list(&self, response: Result<Vec<Value>, ChannelError>) {
        self.list_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_call(&self, response: Result<Value, ChannelError>) {
        self.call_responses.lock().expect("lock").push_back(response);
    }

    pub fn script_login(&self, response: Result<(), ChannelError>) {
        self.login_results.lock().expect("lock").push_back(response);
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn network_calls(&self) -> usize {
        self.recorded().len()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("lock").push(call);
    }

    fn pop<T>(queue: &Mutex<VecDeque<Result<T, ChannelError>>>, op: &str) -> Result<T, ChannelError> {
        queue
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(ChannelError::other(format!("no scripted {op} response"))))
    }
}

impl Channel for MockChannel {
    fn get_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        _fields: Option<&'a [String]>,
    ) -> ChannelFuture<'a, Value> {
        self.record(RecordedCall::GetDoc {
            doctype: doctype.to_owned(),
            name: name.to_owned(),
        });
        let response = Self::pop(&self.get_doc_responses, "get_doc");
        Box::pin(async move { response })
    }

    fn create_doc<'a>(
        &'a self,
        doctype: &'a str,
        _values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value> {
        self.record(RecordedCall::CreateDoc {
            doctype: doctype.to_owned(),
        });
        let response = Self::pop(&self.create_responses, "create_doc");
        Box::pin(async move { response })
    }

    fn update_doc<'a>(
        &'a self,
        doctype: &'a str,
        name: &'a str,
        _values: &'a Map<String, Value>,
    ) -> ChannelFuture<'a, Value> {
        self.record(RecordedCall::UpdateDoc {
            doctype: doctype.to_owned(),
            name: name.to_owned(),
        });
        let response = Self::pop(&self.update_responses, "update_doc");
        Box::pin(async move { response })
    }

    fn delete_doc<'a>(&'a self, doctype: &'a str, name: &'a str) -> ChannelFuture<'a, Value> {
        self.record(RecordedCall::DeleteDoc {
            doctype: doctype.to_owned(),
            name: name.to_owned(),
        });
        let response = Self::pop(&self.delete_responses, "delete_doc");
        Box::pin(async move { response })
    }

    fn get_doc_list<'a>(&'a self, doctype: &'a str, query: ListQuery) -> ChannelFuture<'a, Vec<Value>> {
        self.record(RecordedCall::List {
            doctype: doctype.to_owned(),
            query,
        });
        let response = Self::pop(&self.list_responses, "get_doc_list");
        Box::pin(async move { response })
    }

    fn call<'a>(&'a self, method: &'a str, _params: Option<&'a Value>) -> ChannelFuture<'a, Value> {
        self.record(RecordedCall::Call {
            method: method.to_owned(),
        });
        let response = Self::pop(&self.call_responses, "call");
        Box::pin(async move { response })
    }

    fn login<'a>(&'a self, username: &'a str, _password: &'a str) -> ChannelFuture<'a, ()> {
        self.record(RecordedCall::Login {
            username: username.to_owned(),
        });
        self.login_count.fetch_add(1, Ordering::SeqCst);
        let delay = self.login_delay;
        let response = self
            .login_results
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Ok(()));
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}
