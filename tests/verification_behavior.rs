//! Post-write verification cascade, exercised through a scripted channel.

use std::sync::Arc;

use docgate_core::{ChannelError, DocumentVerifier};
use docgate_tests::{MockChannel, RecordedCall};
use serde_json::{json, Map, Value};

fn values_of(value: Value) -> Map<String, Value> {
    value.as_object().expect("object literal").clone()
}

#[tokio::test]
async fn a_nameless_acknowledgement_never_verifies() {
    let channel = Arc::new(MockChannel::new());
    let verifier = DocumentVerifier::new(channel.clone());

    let outcome = verifier
        .verify("ToDo", &values_of(json!({"title": "file report"})), &json!({"ok": true}))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "creation response lacks a document name");
    // No name means nothing to fetch or search for.
    assert_eq!(channel.network_calls(), 0);
}

#[tokio::test]
async fn direct_fetch_with_a_matching_name_verifies() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({"name": "TODO-0001", "title": "file report"})));
    let verifier = DocumentVerifier::new(channel.clone());

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "verified by direct fetch");
    assert_eq!(
        channel.recorded(),
        vec![RecordedCall::GetDoc {
            doctype: String::from("ToDo"),
            name: String::from("TODO-0001"),
        }]
    );
}

#[tokio::test]
async fn failed_fetch_falls_through_to_filter_search() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Err(ChannelError::status("/api/resource/ToDo/TODO-0001", 404, "")));
    channel.script_list(Ok(vec![json!({"name": "TODO-0001"})]));
    let verifier = DocumentVerifier::new(channel.clone());

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "verified by filter search");

    // The search must have keyed on the most discriminating submitted field.
    match &channel.recorded()[1] {
        RecordedCall::List { query, .. } => {
            assert_eq!(query.filters, Some(json!({"title": "file report"})));
            assert_eq!(query.limit, Some(5));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn description_searches_use_a_truncated_contains_match() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    channel.script_list(Ok(vec![json!({"name": "TODO-0001"})]));
    let verifier = DocumentVerifier::new(channel.clone());

    let description = "a very long description that exceeds the prefix window";
    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"description": description})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(outcome.success);
    match &channel.recorded()[1] {
        RecordedCall::List { query, .. } => {
            assert_eq!(
                query.filters,
                Some(json!({"description": ["like", "%a very long descript%"]}))
            );
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn no_discriminating_field_means_unverifiable() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    let verifier = DocumentVerifier::new(channel.clone());

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"priority": "High"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        "could not verify creation - no suitable filters available"
    );
    // Only the direct fetch went out; no filter search was attempted.
    assert_eq!(channel.network_calls(), 1);
}

#[tokio::test]
async fn empty_search_results_fail_verification() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    channel.script_list(Ok(vec![]));
    let verifier = DocumentVerifier::new(channel);

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "no documents found matching filters");
}

#[tokio::test]
async fn results_without_the_expected_name_fail_with_a_count() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    channel.script_list(Ok(vec![
        json!({"name": "TODO-0002"}),
        json!({"name": "TODO-0003"}),
    ]));
    let verifier = DocumentVerifier::new(channel);

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        "found 2 document(s) matching 'title' but none named 'TODO-0001'"
    );
}

#[tokio::test]
async fn failing_filter_search_reports_the_error() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    channel.script_list(Err(ChannelError::transport(
        "/api/resource/ToDo",
        "connection reset",
        true,
    )));
    let verifier = DocumentVerifier::new(channel);

    let outcome = verifier
        .verify(
            "ToDo",
            &values_of(json!({"title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("filter search failed:"));
    assert!(outcome.message.contains("connection reset"));
}

#[tokio::test]
async fn submitted_name_outranks_title_in_the_cascade() {
    let channel = Arc::new(MockChannel::new());
    channel.script_get_doc(Ok(json!({})));
    channel.script_list(Ok(vec![json!({"name": "TODO-0001"})]));
    let verifier = DocumentVerifier::new(channel.clone());

    verifier
        .verify(
            "ToDo",
            &values_of(json!({"name": "TODO-0001", "title": "file report"})),
            &json!({"name": "TODO-0001"}),
        )
        .await;

    match &channel.recorded()[1] {
        RecordedCall::List { query, .. } => {
            assert_eq!(query.filters, Some(json!({"name": "TODO-0001"})));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}
