mod common;

use flowrun::events::EventBus;
use flowrun::executors::{
    BranchExecutor, DEFAULT_TEMPLATE, ExecContext, MergeExecutor, MessageExecutor, NodeExecutor,
    OutputExecutor,
};
use flowrun::message::Message;
use flowrun::state::{NodeOutput, RunState};
use serde_json::json;

fn ctx(node_id: &str, outgoing: Vec<String>, incoming: Vec<String>) -> ExecContext {
    ExecContext::new(
        node_id.into(),
        outgoing,
        incoming,
        EventBus::new().emitter(),
    )
}

#[tokio::test]
async fn message_renders_template_against_latest_message() {
    let mut state = RunState::new("프롬프트");
    state.messages.push(Message::user("결과"));

    let exec = MessageExecutor::new(Some("요약: {input}".into()));
    let patch = exec.run(&state, &ctx("m", vec![], vec![])).await.unwrap();

    assert_eq!(patch.messages, Some(vec![Message::user("요약: 결과")]));
}

#[tokio::test]
async fn message_default_template_with_empty_state() {
    assert_eq!(DEFAULT_TEMPLATE, "기본 메시지: {input}");

    let exec = MessageExecutor::new(None);
    let patch = exec
        .run(&RunState::default(), &ctx("m", vec![], vec![]))
        .await
        .unwrap();

    assert_eq!(patch.messages, Some(vec![Message::user("기본 메시지: ")]));
}

#[tokio::test]
async fn branch_preserves_target_order() {
    let targets = vec!["t3".to_string(), "t1".to_string(), "t2".to_string()];
    let patch = BranchExecutor
        .run(&RunState::default(), &ctx("b", targets.clone(), vec![]))
        .await
        .unwrap();

    let outputs = patch.node_outputs.unwrap();
    assert_eq!(outputs["b"].data["targetNodes"], json!(targets));
    assert!(outputs["b"].data.get("skipped").is_none());
}

#[tokio::test]
async fn branch_without_targets_skips_without_mutation() {
    let patch = BranchExecutor
        .run(&RunState::default(), &ctx("b", vec![], vec![]))
        .await
        .unwrap();

    let outputs = patch.node_outputs.as_ref().unwrap();
    assert_eq!(outputs["b"].data["skipped"], true);
    assert_eq!(outputs["b"].data["reason"], "no targets");
    assert!(patch.messages.is_none());
    assert!(patch.search_results.is_none());
    assert!(patch.final_result.is_none());
}

#[tokio::test]
async fn merge_counts_and_labels_sources() {
    let mut state = RunState::default();
    state.node_outputs.insert(
        "left".into(),
        NodeOutput::now("message", json!({ "rendered": "왼쪽" })),
    );
    state.node_outputs.insert(
        "right".into(),
        NodeOutput::now("message", json!({ "rendered": "오른쪽" })),
    );

    let patch = MergeExecutor
        .run(
            &state,
            &ctx("j", vec![], vec!["left".into(), "right".into()]),
        )
        .await
        .unwrap();

    let outputs = patch.node_outputs.unwrap();
    assert_eq!(outputs["j"].data["sourceNodeCount"], 2);
    assert_eq!(outputs["j"].data["inputNodeIds"], json!(["left", "right"]));
    assert_eq!(
        outputs["j"].data["mergedContent"],
        "[left] 왼쪽\n[right] 오른쪽"
    );
}

#[tokio::test]
async fn output_snapshot_tracks_message_count_and_mirrors_final_result() {
    let mut state = RunState::new("p");
    state.messages.push(Message::user("하나"));
    state.messages.push(Message::assistant("둘"));

    let patch = OutputExecutor
        .run(&state, &ctx("out", vec![], vec![]))
        .await
        .unwrap();

    let final_result = patch.final_result.unwrap();
    assert_eq!(
        final_result["messages"].as_array().unwrap().len(),
        state.messages.len()
    );

    let outputs = patch.node_outputs.unwrap();
    assert_eq!(outputs["out"].data["finalResult"], final_result);
}
