//! End-to-end runs through `EngineBridge`: an in-process rule base loaded
//! from disk, and a remote engine answered by a canned HTTP server.

mod common;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use artdoc::client::EngineBridge;
use artdoc::controller::{DiagnosticSession, SessionStatus};
use artdoc::error::SessionError;
use artdoc::kb::KnowledgeBase;
use artdoc::model::{ConclusionId, DiagnosisResult, SymptomId, VerificationResult};

use common::canned_server;

const RULES: &str = "\
rule_id,conditions,conclusion,precautions
R1,fever;cough,flu,Rest and hydrate
R2,flu;body_ache,severe_flu,See a doctor
R3,headache;stiff_neck,meningitis_risk,
";

fn rule_base() -> KnowledgeBase {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(RULES.as_bytes()).unwrap();
    KnowledgeBase::load(file.path()).unwrap()
}

fn local_bridge() -> EngineBridge {
    EngineBridge::local(Arc::new(rule_base()))
}

fn ids(names: &[&str]) -> Vec<SymptomId> {
    names.iter().map(|n| SymptomId::from(*n)).collect()
}

fn remote(url: &str) -> EngineBridge {
    EngineBridge::remote(url, Duration::from_secs(5))
}

fn catalog_responses() -> Vec<(u16, String)> {
    vec![
        (200, r#"["cough","fever","headache"]"#.to_string()),
        (200, r#"["flu"]"#.to_string()),
    ]
}

#[tokio::test]
async fn local_rule_base_diagnoses_and_chains() {
    let session = DiagnosticSession::start(local_bridge()).await.unwrap();
    assert_eq!(
        session.catalog().symptoms(),
        ["body_ache", "cough", "fever", "headache", "stiff_neck"].map(SymptomId::from)
    );
    assert_eq!(
        session.catalog().conclusions().unwrap(),
        ["flu", "meningitis_risk", "severe_flu"].map(ConclusionId::from)
    );

    for id in ["fever", "cough", "body_ache"] {
        session.toggle(&id.into()).unwrap();
    }
    let result = session.run_diagnosis().await.unwrap();
    let fired: Vec<&str> = result.fired_rules.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(fired, ["R1", "R2"]);
    assert_eq!(result.fired_rules[1].precautions.as_deref(), Some("See a doctor"));
}

#[tokio::test]
async fn local_rule_base_explains_failed_verification() {
    let session = DiagnosticSession::start(local_bridge()).await.unwrap();
    session.toggle(&"fever".into()).unwrap();

    let result = session.run_verification(&"flu".into()).await.unwrap();
    assert!(!result.success);
    assert_eq!(
        result.trace,
        [
            "Checking Rule R1 for 'flu'...",
            "    [OK] Fact 'fever' detected.",
            "    [MISSING] 'cough' not found in symptoms.",
            "[FAIL] Could not establish 'flu'.",
        ]
    );
}

#[tokio::test]
async fn local_rule_base_confirms_nested_goal() {
    let session = DiagnosticSession::start(local_bridge()).await.unwrap();
    for id in ["fever", "cough", "body_ache"] {
        session.toggle(&id.into()).unwrap();
    }
    let result = session
        .run_verification(&"severe_flu".into())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(
        result.trace.last().map(String::as_str),
        Some("[SUCCESS] Rule R2 fired. 'severe_flu' confirmed.")
    );
}

#[test]
fn server_payloads_satisfy_client_validation() {
    let kb = rule_base();
    // R1 carries precautions, R3 has none.
    let symptoms = ids(&["fever", "cough", "headache", "stiff_neck"]);

    let chain = kb.forward_chain(&symptoms);
    let wire = serde_json::to_value(&chain).unwrap();
    assert!(wire.get("known_facts").is_some());
    let diagnosis = DiagnosisResult::from_wire(&wire).unwrap();
    assert_eq!(diagnosis.fired_rules, chain.fired_rules);
    let fired: Vec<&str> = diagnosis.fired_rules.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(fired, ["R1", "R3"]);
    assert_eq!(diagnosis.fired_rules[1].precautions, None);

    for target in ["flu", "severe_flu", "not_a_conclusion"] {
        let verdict = kb.backward_verify(&target.into(), &symptoms);
        let wire = serde_json::to_value(&verdict).unwrap();
        assert_eq!(VerificationResult::from_wire(&wire).unwrap(), verdict, "{target}");
    }
}

#[tokio::test]
async fn remote_client_reads_what_the_server_writes() {
    let kb = rule_base();
    let symptoms = ids(&["cough", "fever", "headache", "stiff_neck"]);
    let body = |value: serde_json::Value| (200, value.to_string());
    let url = canned_server(vec![
        body(serde_json::to_value(kb.observable_symptoms()).unwrap()),
        body(serde_json::to_value(kb.conclusions()).unwrap()),
        body(serde_json::to_value(kb.forward_chain(&symptoms)).unwrap()),
        body(serde_json::to_value(kb.backward_verify(&"severe_flu".into(), &symptoms)).unwrap()),
    ]);

    let over_http = DiagnosticSession::start(remote(&url)).await.unwrap();
    let in_process = DiagnosticSession::start(local_bridge()).await.unwrap();
    assert_eq!(over_http.catalog().symptoms(), in_process.catalog().symptoms());
    assert_eq!(
        over_http.catalog().conclusions().unwrap(),
        in_process.catalog().conclusions().unwrap()
    );

    for id in &symptoms {
        over_http.toggle(id).unwrap();
        in_process.toggle(id).unwrap();
    }
    assert_eq!(
        over_http.run_diagnosis().await.unwrap(),
        in_process.run_diagnosis().await.unwrap()
    );
    let target = ConclusionId::from("severe_flu");
    assert_eq!(
        over_http.run_verification(&target).await.unwrap(),
        in_process.run_verification(&target).await.unwrap()
    );
}

#[tokio::test]
async fn remote_engine_round_trip() {
    let mut responses = catalog_responses();
    responses.push((
        200,
        r#"{"fired_rules":[{"rule_id":"R1","conditions":["fever","cough"],"conclusion":"flu","precautions":"Rest and hydrate"}],"known_facts":["cough","fever","flu"]}"#
            .to_string(),
    ));
    responses.push((
        200,
        r#"{"success":true,"trace":["[OK] Fact 'fever' detected."]}"#.to_string(),
    ));
    let url = canned_server(responses);

    let session = DiagnosticSession::start(remote(&url)).await.unwrap();
    assert_eq!(session.catalog().symptoms().len(), 3);
    session.toggle(&"fever".into()).unwrap();
    session.toggle(&"cough".into()).unwrap();

    let diagnosis = session.run_diagnosis().await.unwrap();
    assert_eq!(diagnosis.fired_rules.len(), 1);
    assert_eq!(diagnosis.fired_rules[0].conclusion, ConclusionId::from("flu"));

    let verdict = session.run_verification(&"flu".into()).await.unwrap();
    assert!(verdict.success);
    assert_eq!(verdict.trace.len(), 1);
}

#[tokio::test]
async fn remote_shape_mismatch_is_engine_error() {
    let mut responses = catalog_responses();
    responses.push((200, r#"{"fired_rules":[{"rule_id":"R1"}]}"#.to_string()));
    let url = canned_server(responses);

    let session = DiagnosticSession::start(remote(&url)).await.unwrap();
    session.toggle(&"fever".into()).unwrap();
    let err = session.run_diagnosis().await.unwrap_err();
    assert!(matches!(err, SessionError::EngineError { .. }), "{err:?}");
    assert!(session.last_result().is_none());
    assert_eq!(session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn remote_server_error_is_engine_error() {
    let mut responses = catalog_responses();
    responses.push((500, r#"{"error":"rule base corrupted"}"#.to_string()));
    let url = canned_server(responses);

    let session = DiagnosticSession::start(remote(&url)).await.unwrap();
    session.toggle(&"fever".into()).unwrap();
    let err = session.run_verification(&"flu".into()).await.unwrap_err();
    assert!(matches!(err, SessionError::EngineError { .. }), "{err:?}");
}

#[tokio::test]
async fn remote_non_json_body_is_engine_error() {
    let mut responses = catalog_responses();
    responses.push((200, "<html>maintenance</html>".to_string()));
    let url = canned_server(responses);

    let session = DiagnosticSession::start(remote(&url)).await.unwrap();
    session.toggle(&"cough".into()).unwrap();
    let err = session.run_diagnosis().await.unwrap_err();
    assert!(matches!(err, SessionError::EngineError { .. }), "{err:?}");
}

#[tokio::test]
async fn remote_missing_conclusions_still_allows_diagnosis() {
    let url = canned_server(vec![
        (200, r#"["fever"]"#.to_string()),
        (503, "unavailable".to_string()),
        (200, r#"{"fired_rules":[]}"#.to_string()),
    ]);

    let session = DiagnosticSession::start(remote(&url)).await.unwrap();
    assert!(session.catalog().conclusions().is_err());
    session.toggle(&"fever".into()).unwrap();
    assert!(session.run_diagnosis().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_server_fails_session_start() {
    let err = DiagnosticSession::start(EngineBridge::remote(
        "http://127.0.0.1:9",
        Duration::from_millis(500),
    ))
    .await
    .err()
    .unwrap();
    assert!(matches!(err, SessionError::EngineUnavailable { .. }), "{err:?}");
}
