//! 推理循环集成测试：MockLlmClient + ScriptedBackend

use std::sync::Arc;

use serde_json::{json, Value};
use sgr_agent::actions::Action;
use sgr_agent::backend::{ScriptedBackend, TaskInfo};
use sgr_agent::core::{ApiError, Outcome};
use sgr_agent::llm::MockLlmClient;
use sgr_agent::memory::Role;
use sgr_agent::sgr::{AgentEvent, ERROR_HANDLING_TOOL};
use sgr_agent::{AgentSettings, SgrAgent, StopReason};

fn settings() -> AgentSettings {
    AgentSettings {
        console: false,
        ..AgentSettings::default()
    }
}

fn task(text: &str) -> TaskInfo {
    TaskInfo {
        task_id: "task_1".into(),
        spec_id: "spec_1".into(),
        task_text: text.into(),
    }
}

/// 公开访问的基础后端：身份、rulebook、最终回复
fn base_backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .respond("/whoami", json!({"current_user": null, "is_public": true}))
        .respond("/wiki/load", json!({"file": "rulebook.md", "content": "Be careful."}))
        .respond("/respond", json!({}))
}

fn decision(plan: &[&str], function: Value) -> String {
    json!({
        "current_state": "working",
        "plan_remaining_steps_brief": plan,
        "task_completed": false,
        "function": function,
    })
    .to_string()
}

fn respond(outcome: &str, message: &str, links: Value) -> String {
    decision(
        &["report"],
        json!({"tool": "/respond", "message": message, "outcome": outcome, "links": links}),
    )
}

#[tokio::test]
async fn test_step_budget_caps_model_calls() {
    let script: Vec<String> = (0..25)
        .map(|_| decision(&["get project"], json!({"tool": "/projects/get", "id": "proj_1"})))
        .collect();
    let llm = Arc::new(MockLlmClient::new(script));
    let backend = Arc::new(base_backend().respond("/projects/get", json!({"project": {"id": "proj_1"}})));
    let agent = SgrAgent::new(llm.clone(), backend.clone(), settings());

    let run = agent.run(&task("loop forever")).await.unwrap();

    assert_eq!(run.stop, StopReason::BudgetExhausted);
    assert_eq!(run.steps, 20);
    assert_eq!(llm.calls(), 20);
    assert_eq!(backend.calls_to("/projects/get"), 20);
    // system + user + 20 × (assistant + tool)
    assert_eq!(run.log.len(), 42);
    assert_eq!(run.log[40].tool_call.as_ref().unwrap().id, "step_20");
}

#[tokio::test]
async fn test_later_plan_steps_do_not_affect_dispatch() {
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(
            &["get proj_a", "delete proj_b", "raise salaries"],
            json!({"tool": "/projects/get", "id": "proj_a"}),
        ),
        respond("ok_answer", "Found it", json!([{"kind": "project", "id": "proj_a"}])),
    ]));
    let backend = Arc::new(base_backend().respond("/projects/get", json!({"project": {"id": "proj_a"}})));
    let agent = SgrAgent::new(llm, backend.clone(), settings());

    let run = agent.run(&task("show proj_a")).await.unwrap();

    assert_eq!(run.stop, StopReason::Completed);
    let action_calls: Vec<_> = backend
        .calls()
        .into_iter()
        .filter(|(tool, _)| tool != "/whoami" && tool != "/wiki/load")
        .collect();
    assert_eq!(action_calls.len(), 2);
    assert_eq!(action_calls[0], ("/projects/get".to_string(), json!({"id": "proj_a"})));
    assert_eq!(action_calls[1].0, "/respond");
    assert_eq!(run.log[2].content, "get proj_a");
}

#[tokio::test]
async fn test_not_found_is_recovered_and_loop_continues() {
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(&["get project"], json!({"tool": "/projects/get", "id": "ghost"})),
        respond("ok_not_found", "No such project", json!([])),
    ]));
    let backend = Arc::new(
        base_backend().fail(
            "/projects/get",
            ApiError::new("Project not found").with_status(404),
        ),
    );
    let agent = SgrAgent::new(llm.clone(), backend, settings());

    let run = agent.run(&task("show ghost project")).await.unwrap();

    assert_eq!(run.stop, StopReason::Completed);
    // 快路径命中，没有兜底调用
    assert_eq!(llm.calls(), 2);
    let entry = &run.log[3];
    assert_eq!(entry.role, Role::Tool);
    assert_eq!(entry.name.as_deref(), Some(ERROR_HANDLING_TOOL));
    assert_eq!(entry.tool_call_id.as_deref(), Some("step_1"));
    let analysis: Value = serde_json::from_str(&entry.content).unwrap();
    assert_eq!(analysis["outcome"], "ok_not_found");
    assert_eq!(analysis["should_continue"], true);
    let recovered = run.last_error_response.as_ref().unwrap();
    assert_eq!(recovered.outcome, Outcome::OkNotFound);
    assert!(recovered.links.is_empty());
    assert_eq!(run.surfaced_message(), Some("No such project"));
}

#[tokio::test]
async fn test_unmatched_error_uses_model_fallback_once() {
    let fallback = json!({
        "outcome": "error_internal",
        "should_continue": false,
        "reasoning": "payload shape is unknown",
        "suggested_message": "Something went wrong."
    })
    .to_string();
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(
            &["summarize"],
            json!({"tool": "/time/summary/by-project", "date_from": "2025-01-01", "date_to": "2025-01-31"}),
        ),
        fallback,
        respond("error_internal", "Could not finish", json!([])),
    ]));
    let backend = Arc::new(
        base_backend().fail("/time/summary/by-project", ApiError::new("unexpected payload shape")),
    );
    let agent = SgrAgent::new(llm.clone(), backend, settings());

    let run = agent.run(&task("summarize time")).await.unwrap();

    assert_eq!(llm.calls(), 3);
    let requests = llm.requests();
    assert_eq!(requests[1].schema_name.as_deref(), Some("ErrorAnalysis"));
    assert_eq!(requests[1].max_tokens, 500);
    assert!(requests[1].messages[1].content.contains("unexpected payload shape"));
    assert!(requests[1].messages[1].content.contains("executing TimeSummaryByProject"));
    let error_entry: Value = serde_json::from_str(&run.log[3].content).unwrap();
    assert_eq!(error_entry["suggested_message"], "Something went wrong.");
}

#[tokio::test]
async fn test_current_user_answer_stays_out_of_log() {
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(
            &["ask who I am"],
            json!({"tool": "question_about_current_user", "question": "Who am I?"}),
        ),
        "You are a guest visitor.".to_string(),
        respond("ok_answer", "You are a guest", json!([])),
    ]));
    let backend = Arc::new(base_backend());
    let agent = SgrAgent::new(llm.clone(), backend.clone(), settings());

    let run = agent.run(&task("who am I?")).await.unwrap();

    assert_eq!(run.stop, StopReason::Completed);
    assert_eq!(llm.calls(), 3);
    assert!(run.log.iter().all(|m| !m.content.contains("guest visitor")));
    // step_1 只有 assistant 条目，没有对应的 tool 条目
    assert!(run
        .log
        .iter()
        .all(|m| m.tool_call_id.as_deref() != Some("step_1")));
    let step_two = &llm.requests()[2];
    assert!(step_two.messages.iter().all(|m| !m.content.contains("guest visitor")));
    assert_eq!(step_two.schema_name.as_deref(), Some("NextStep"));
}

#[tokio::test]
async fn test_schema_violation_stops_without_retry() {
    let two_actions = json!({
        "current_state": "confused",
        "plan_remaining_steps_brief": ["do both"],
        "task_completed": false,
        "function": [
            {"tool": "/projects/get", "id": "a"},
            {"tool": "/employees/get", "id": "b"}
        ]
    })
    .to_string();
    let llm = Arc::new(MockLlmClient::new(vec![
        two_actions,
        respond("ok_answer", "never reached", json!([])),
    ]));
    let backend = Arc::new(base_backend());
    let agent = SgrAgent::new(llm.clone(), backend.clone(), settings());

    let run = agent.run(&task("do two things")).await.unwrap();

    match &run.stop {
        StopReason::SchemaViolation(e) => assert!(e.contains("exactly one")),
        other => panic!("unexpected stop {:?}", other),
    }
    assert_eq!(run.steps, 1);
    assert_eq!(llm.calls(), 1);
    assert_eq!(backend.calls_to("/projects/get"), 0);
    assert_eq!(backend.calls_to("/employees/get"), 0);
    assert_eq!(run.log.len(), 2);
}

#[tokio::test]
async fn test_non_ok_response_emits_no_links() {
    let llm = Arc::new(MockLlmClient::new(vec![respond(
        "denied_security",
        "You may not see salaries",
        json!([{"kind": "employee", "id": "ceo"}]),
    )]));
    let backend = Arc::new(base_backend());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let agent = SgrAgent::new(llm, backend.clone(), settings()).with_event_tx(tx);

    let run = agent.run(&task("what is the CEO salary?")).await.unwrap();

    let final_response = run.final_response.as_ref().unwrap();
    assert_eq!(final_response.outcome, Outcome::DeniedSecurity);
    assert!(final_response.links.is_empty());

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::Completed { links, .. } = event {
            completed = Some(links);
        }
    }
    assert_eq!(completed, Some(Vec::new()));

    let sent = backend
        .calls()
        .into_iter()
        .find(|(tool, _)| tool == "/respond")
        .unwrap();
    assert_eq!(sent.1["links"], json!([]));
}

#[tokio::test]
async fn test_logged_arguments_round_trip() {
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(
            &["find entries"],
            json!({
                "tool": "/time/search",
                "employee": "felix_baum",
                "customer": null,
                "project": "proj_acme",
                "billable": true,
                "offset": 0,
                "limit": 5
            }),
        ),
        respond("ok_answer", "3 entries", json!([])),
    ]));
    let backend = Arc::new(base_backend().respond("/time/search", json!({"entries": [], "next_offset": null})));
    let agent = SgrAgent::new(llm, backend.clone(), settings());

    let run = agent.run(&task("find Felix's entries")).await.unwrap();

    let call = run.log[2].tool_call.as_ref().unwrap();
    assert_eq!(call.name, "SearchTimeEntries");
    assert!(!call.arguments.contains("null"));
    let parsed: Action = serde_json::from_str(&call.arguments).unwrap();
    match parsed {
        Action::SearchTimeEntries(req) => {
            assert_eq!(req.employee.as_deref(), Some("felix_baum"));
            assert_eq!(req.customer, None);
            assert_eq!(req.billable, Some(true));
            assert_eq!(req.limit, 5);
        }
        other => panic!("unexpected action {:?}", other),
    }
    // 结果去除了 null
    assert_eq!(run.log[3].content, r#"{"entries":[]}"#);
}

#[tokio::test]
async fn test_authenticated_prompt_includes_profile() {
    let llm = Arc::new(MockLlmClient::new(vec![respond("ok_answer", "hi", json!([]))]));
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond("/whoami", json!({"current_user": "elena_vogel"}))
            .respond("/wiki/load", json!({"file": "rulebook.md", "content": "Rules"}))
            .respond("/employees/get", json!({"employee": {"id": "elena_vogel", "name": "Elena Vogel"}}))
            .respond("/respond", json!({})),
    );
    let agent = SgrAgent::new(llm.clone(), backend, settings());

    agent.run(&task("hello")).await.unwrap();

    let system = &llm.requests()[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("Elena Vogel"));
    assert!(!system.content.contains("public access only"));
}

#[tokio::test]
async fn test_unreachable_backend_aborts_task() {
    let llm = Arc::new(MockLlmClient::new(vec![
        decision(&["get project"], json!({"tool": "/projects/get", "id": "proj_1"})),
        respond("ok_answer", "never reached", json!([])),
    ]));
    let backend = Arc::new(base_backend().fail(
        "/projects/get",
        ApiError::transport("request failed", "operation timed out"),
    ));
    let agent = SgrAgent::new(llm.clone(), backend, settings());

    let err = agent.run(&task("show proj_1")).await.unwrap_err();

    match err {
        sgr_agent::core::AgentError::Backend(e) => assert!(e.is_transport()),
        other => panic!("unexpected error {:?}", other),
    }
    // 没有进入错误恢复，也没有继续推理
    assert_eq!(llm.calls(), 1);
}
