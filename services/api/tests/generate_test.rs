mod common;

use assessment_core::ports::ProviderError;
use assessment_core::{ArtifactKind, GenerateRequest, PipelineError};
use axum::http::StatusCode;
use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn generate_body(harness: &Harness, document_ids: &[uuid::Uuid]) -> serde_json::Value {
    json!({ "documentIds": document_ids, "classroomId": harness.classroom_id })
}

#[tokio::test]
async fn two_readable_documents_produce_a_full_draft() {
    let harness = Harness::new(1);
    let a = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    let b = harness.add_document("Entropy", Some(&lecture_text("entropy")));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[a, b])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stats"]["processedDocuments"], 2);
    assert_eq!(body["stats"]["failedDocuments"], 0);
    assert_eq!(body["stats"]["itemsGenerated"], 4);
    assert_eq!(body["artifact"]["state"], "draft");
    assert_eq!(body["artifact"]["isActive"], false);
    assert_eq!(body["artifact"]["items"].as_array().unwrap().len(), 4);
    assert_eq!(body["artifact"]["totalWeight"], 4);
    assert_eq!(body["artifact"]["ownerId"], harness.teacher_id.to_string());
    assert_eq!(
        body["artifact"]["sourceDocumentIds"],
        json!([a.to_string(), b.to_string()])
    );
    assert_eq!(harness.db.artifact_count(), 1);
}

#[tokio::test]
async fn one_unreadable_document_is_counted_not_fatal() {
    let harness = Harness::new(1);
    let missing = harness.add_document("Lost slides", None);
    let good = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[missing, good])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stats"]["totalDocuments"], 2);
    assert_eq!(body["stats"]["processedDocuments"], 1);
    assert_eq!(body["stats"]["failedDocuments"], 1);
    assert_eq!(body["artifact"]["sourceDocumentIds"], json!([good.to_string()]));
}

#[tokio::test]
async fn every_document_failing_is_a_content_error() {
    let harness = Harness::new(1);
    let missing = harness.add_document("Lost slides", None);
    let garbage = harness.add_raw_document("Scan", Some(vec![0xff, 0xfe, 0x00, 0x81, 0xc3, 0x28]));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[missing, garbage])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NoExtractableContent");
    assert_eq!(body["stats"]["failedDocuments"], 2);
    assert_eq!(body["stats"]["processedDocuments"], 0);
    assert_eq!(harness.provider.call_count(), 0);
    assert_eq!(harness.db.artifact_count(), 0);
}

#[tokio::test]
async fn section_without_survivors_still_counts_its_drops() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(mcq_reply(2));
    // Short-answer section: both candidates lack a model answer.
    harness.provider.reply_with(json!({
        "questions": [{ "question": "Define entropy." }, { "question": "Define enthalpy." }]
    }));
    harness.provider.reply_with(free_response_reply(1));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/test-paper/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stats"]["itemsGenerated"], 3);
    assert_eq!(body["stats"]["itemsDropped"], 2);
    assert_eq!(body["artifact"]["totalWeight"], 1 + 1 + 10);
}

#[tokio::test]
async fn short_corpus_is_rejected_before_any_provider_call() {
    let harness = Harness::new(2);
    let short = "Energy is conserved in closed systems. ".repeat(5);
    assert!(short.len() < 500);
    let doc = harness.add_document("Summary", Some(&short));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ContentTooShort");
    assert_eq!(body["stats"]["processedDocuments"], 1);
    assert_eq!(harness.provider.call_count(), 0);
    assert_eq!(harness.db.artifact_count(), 0);
}

#[tokio::test]
async fn malformed_item_is_dropped_and_the_rest_kept() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    let mut reply = mcq_reply(4);
    reply["questions"][1]["options"] = json!(["Option A2", "Option B2", "Option C2"]);
    harness.provider.reply_with(reply);
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let items = body["artifact"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items
        .iter()
        .all(|item| item["prompt"] != "Question 2 about energy?"));
    for item in items {
        let options = item["body"]["options"].as_array().unwrap();
        assert_eq!(options.len(), 4);
        assert!(options.contains(&item["body"]["correctAnswer"]));
    }
    assert_eq!(body["stats"]["itemsDropped"], 1);
    assert_eq!(body["stats"]["itemsRequested"], 4);
}

#[tokio::test]
async fn quota_on_every_credential_stops_after_one_attempt_each() {
    let harness = Harness::new(2);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    for _ in 0..3 {
        harness
            .provider
            .push(Err(ProviderError::QuotaExhausted("insufficient_quota".into())));
    }
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "AllCredentialsExhausted");
    assert_eq!(harness.provider.credentials_used(), vec!["key-1", "key-2"]);
    assert_eq!(harness.db.artifact_count(), 0);
}

#[tokio::test]
async fn quota_on_first_credential_rotates_to_the_next() {
    let harness = Harness::new(2);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness
        .provider
        .push(Err(ProviderError::QuotaExhausted("429".into())));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(harness.provider.credentials_used(), vec!["key-1", "key-2"]);
}

#[tokio::test]
async fn non_quota_provider_errors_are_not_retried() {
    let harness = Harness::new(3);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness
        .provider
        .push(Err(ProviderError::Rejected("invalid api key".into())));
    let app = harness.app();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.provider.call_count(), 1);
}

#[tokio::test]
async fn unparseable_reply_is_a_generation_failure() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness
        .provider
        .push(Ok("Sure! Here are some questions about energy.".to_string()));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "MalformedResponse");
    assert_eq!(harness.db.artifact_count(), 0);
}

#[tokio::test]
async fn input_errors_are_bad_requests() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(json!({ "documentIds": [], "classroomId": harness.classroom_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NoDocumentsSelected");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/quiz/generate-ai",
            Some(harness.teacher_id),
            Some(json!({ "documentIds": [doc] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MissingClassroom");
    assert_eq!(harness.provider.call_count(), 0);
}

#[tokio::test]
async fn documents_from_another_classroom_are_not_found() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/assignment/generate-ai",
            Some(harness.teacher_id),
            Some(json!({ "documentIds": [doc], "classroomId": uuid::Uuid::new_v4() })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "DocumentsNotFound");
}

#[tokio::test]
async fn test_paper_combines_every_section() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(mcq_reply(2));
    harness.provider.reply_with(free_response_reply(1));
    harness.provider.reply_with(free_response_reply(1));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/test-paper/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["artifact"]["kind"], "test-paper");
    let items = body["artifact"]["items"].as_array().unwrap();
    let kinds: Vec<_> = items
        .iter()
        .map(|i| (i["body"]["type"].as_str().unwrap(), i["body"]["longForm"].as_bool()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("multiple-choice", None),
            ("multiple-choice", None),
            ("free-response", Some(false)),
            ("free-response", Some(true)),
        ]
    );
    assert_eq!(body["artifact"]["totalWeight"], 1 + 1 + 3 + 10);
    assert_eq!(harness.provider.call_count(), 3);
}

#[tokio::test]
async fn assignment_items_carry_model_answers() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(free_response_reply(2));
    let app = harness.app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/assignment/generate-ai",
            Some(harness.teacher_id),
            Some(generate_body(&harness, &[doc])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let items = body["artifact"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items
        .iter()
        .all(|i| !i["body"]["modelAnswerKey"].as_str().unwrap().is_empty()));
    assert_eq!(body["artifact"]["totalWeight"], 10);
}

#[tokio::test]
async fn cancelled_request_persists_nothing() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(mcq_reply(4));
    let pipeline = harness.pipeline();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = pipeline
        .generate(
            GenerateRequest {
                kind: ArtifactKind::Quiz,
                classroom_id: Some(harness.classroom_id),
                owner_id: harness.teacher_id,
                document_ids: vec![doc],
            },
            &cancel,
        )
        .await;

    let failure = result.unwrap_err();
    assert!(matches!(failure.error, PipelineError::Cancelled));
    assert_eq!(harness.provider.call_count(), 0);
    assert_eq!(harness.db.artifact_count(), 0);
}

#[tokio::test]
async fn each_generation_creates_a_separate_draft() {
    let harness = Harness::new(1);
    let doc = harness.add_document("Thermodynamics", Some(&lecture_text("thermodynamics")));
    harness.provider.reply_with(mcq_reply(4));
    harness.provider.reply_with(mcq_reply(4));
    let app = harness.app();

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/quiz/generate-ai",
                Some(harness.teacher_id),
                Some(generate_body(&harness, &[doc, doc])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(harness.db.artifact_count(), 2);
}
