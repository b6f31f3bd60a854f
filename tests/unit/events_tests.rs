/*!
 * Tests for job event serialization
 */

use serde_json::json;
use std::collections::BTreeSet;
use subtrans::events::{EventSink, JobEvent, LogEventSink};
use subtrans::translation::RunState;
use subtrans::verification::{Decision, Issue, IssueStatus, ProblemType};

/// Test approval requests carry the issue in camelCase form
#[test]
fn test_approvalRequested_serialize_shouldNestIssue() {
    let mut issue = Issue::new(7, BTreeSet::from([ProblemType::TooFree]), "orig", "cur", 4, None);
    issue.improved_translation = Some("better".to_string());

    let value = serde_json::to_value(JobEvent::ApprovalRequested {
        job_id: "job".to_string(),
        issue,
        context_before: Vec::new(),
        context_after: Vec::new(),
    })
    .unwrap();

    assert_eq!(value["type"], "approvalRequested");
    assert_eq!(value["jobId"], "job");
    assert_eq!(value["issue"]["blockNumber"], 7);
    assert_eq!(value["issue"]["problemTypes"], json!(["TOO_FREE"]));
    assert_eq!(value["issue"]["improvedTranslation"], "better");
    assert_eq!(value["issue"]["status"], "pending");
}

/// Test run state changes serialize both flags
#[test]
fn test_runStateChanged_serialize_shouldIncludeFlags() {
    let value = serde_json::to_value(JobEvent::RunStateChanged {
        job_id: "job".to_string(),
        state: RunState { paused: true, cancelled: false },
    })
    .unwrap();

    assert_eq!(value, json!({"type": "runStateChanged", "jobId": "job", "state": {"paused": true, "cancelled": false}}));
}

/// Test decisions read from the wire in every shape
#[test]
fn test_decision_deserialize_shouldAcceptEveryAction() {
    let approve: Decision = serde_json::from_value(json!({"blockNumber": 3, "action": "approve"})).unwrap();
    let approve_with_text: Decision = serde_json::from_value(json!({"blockNumber": 3, "action": "approve", "text": "X"})).unwrap();
    let edit: Decision = serde_json::from_value(json!({"blockNumber": 4, "action": "edit", "text": "Y"})).unwrap();
    let skip: Decision = serde_json::from_value(json!({"blockNumber": 5, "action": "skip"})).unwrap();

    assert_eq!(approve, Decision::approve(3, None));
    assert_eq!(approve_with_text, Decision::approve(3, Some("X".to_string())));
    assert_eq!(edit, Decision::edit(4, "Y"));
    assert_eq!(skip.status(), IssueStatus::Skipped);
}

/// Test the log sink accepts every kind of event
#[test]
fn test_logEventSink_shouldAcceptEveryEvent() {
    crate::common::init_logging();
    let sink = LogEventSink;

    sink.emit(JobEvent::Progress { job_id: "job".to_string(), current: 1, total: 2 });
    sink.emit(JobEvent::JobCancelled { job_id: "job".to_string(), windows_completed: 1 });
    sink.emit(JobEvent::VerificationError { job_id: "job".to_string(), message: "boom".to_string() });
}
