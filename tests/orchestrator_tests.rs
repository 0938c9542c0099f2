//! End-to-end tests of the model/tool loop over a scripted transport.

mod common;

use common::*;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use roci_chat::chat::{ChatHandle, ChatRequest};
use roci_chat::encoder::{FrameType, WireFrame};
use roci_chat::error::{ChatError, ClientErrorCode};
use roci_chat::types::Role;

fn ask(message: &str) -> ChatRequest {
    ChatRequest::builder()
        .user_id(1)
        .message(message)
        .enable_tools(true)
        .build()
}

async fn drain(handle: ChatHandle) -> (String, Vec<WireFrame>) {
    let session_id = handle.session_id().to_string();
    let frames = handle.collect().await;
    (session_id, frames)
}

fn assert_single_final_last(frames: &[WireFrame]) {
    let finals: Vec<_> = frames.iter().filter(|f| f.is_final).collect();
    assert_eq!(finals.len(), 1, "exactly one final frame: {frames:?}");
    assert!(frames.last().is_some_and(|f| f.is_final));
}

#[tokio::test]
async fn plain_answer_streams_content_then_done() {
    let transport = ScriptedTransport::new([text_turn(&["Hel", "lo"])]);
    let (service, _repo) = service(test_config(), transport.clone(), registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(
        frame_types(&frames),
        vec![FrameType::Content, FrameType::Content, FrameType::Done]
    );
    assert_eq!(concatenated(&frames, FrameType::Content), "Hello");
    assert!(frames.iter().all(|f| f.session_id == session_id));
    assert_single_final_last(&frames);

    let history = service.history(&session_id).await.unwrap();
    let stored: Vec<_> = history.iter().map(|m| (m.role, m.content.as_str())).collect();
    assert_eq!(stored, vec![(Role::User, "hi"), (Role::Assistant, "Hello")]);
}

#[tokio::test]
async fn weather_question_runs_tool_then_answers() {
    let counter = CallCounter::default();
    let transport = ScriptedTransport::new([
        tool_turn(&[("call_1", "getWeather", r#"{"city":"NYC"}"#)]),
        text_turn(&["It's sunny ", "in NYC."]),
    ]);
    let (service, _repo) = service(
        test_config(),
        transport.clone(),
        registry_with(vec![weather_tool(counter.clone())]),
    );

    let (session_id, frames) =
        drain(service.chat(ask("What's the weather in NYC?")).await.unwrap()).await;

    assert_eq!(
        frame_types(&frames),
        vec![
            FrameType::ToolCall,
            FrameType::ToolResult,
            FrameType::Content,
            FrameType::Content,
            FrameType::Done,
        ]
    );
    let call = frames[0].tool_call.as_ref().unwrap();
    assert_eq!(call.id, "call_1");
    assert_eq!(call.name, "getWeather");
    assert_eq!(call.arguments, json!({ "city": "NYC" }));
    assert_eq!(frames[0].text, "getWeather");

    let result = frames[1].tool_result.as_ref().unwrap();
    assert!(result.success);
    assert_eq!(result.tool_call_id, "call_1");
    assert_eq!(result.result, json!({ "city": "NYC", "forecast": "sunny", "tempF": 72 }));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&frames[1].text).unwrap(),
        result.result
    );
    assert_eq!(counter.get(), 1);

    // The second model call sees the tool exchange.
    let seen = transport.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].tools.len(), 1);
    let roles: Vec<_> = seen[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
    assert_eq!(seen[1].messages[1].tool_calls()[0].name, "getWeather");
    assert_eq!(seen[1].messages[2].tool_call_id.as_deref(), Some("call_1"));

    // Only the user turn and the final answer are stored.
    let history = service.history(&session_id).await.unwrap();
    let stored: Vec<_> = history.iter().map(|m| (m.role, m.content.as_str())).collect();
    assert_eq!(
        stored,
        vec![
            (Role::User, "What's the weather in NYC?"),
            (Role::Assistant, "It's sunny in NYC."),
        ]
    );
}

#[tokio::test]
async fn fragmented_tool_call_is_reassembled() {
    let counter = CallCounter::default();
    let transport = ScriptedTransport::new([
        Turn::Stream(vec![
            tool_delta(0, Some("c1"), Some("get"), None),
            tool_delta(0, None, Some("Weather"), Some("{\"ci")),
            tool_delta(0, None, None, Some("ty\":\"N")),
            tool_delta(0, None, None, Some("YC\"}")),
            finish("tool_calls"),
        ]),
        text_turn(&["done"]),
    ]);
    let (service, _repo) = service(
        test_config(),
        transport,
        registry_with(vec![weather_tool(counter.clone())]),
    );

    let (_, frames) = drain(service.chat(ask("weather?")).await.unwrap()).await;

    let call = frames[0].tool_call.as_ref().unwrap();
    assert_eq!(call.name, "getWeather");
    assert_eq!(call.arguments, json!({ "city": "NYC" }));
    assert!(frames[1].tool_result.as_ref().unwrap().success);
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn tool_calls_in_one_turn_run_in_order() {
    let counter = CallCounter::default();
    let transport = ScriptedTransport::new([
        tool_turn(&[
            ("a", "getWeather", r#"{"city":"NYC"}"#),
            ("b", "getWeather", r#"{"city":"SF"}"#),
        ]),
        text_turn(&["Both sunny."]),
    ]);
    let (service, _repo) = service(
        test_config(),
        transport.clone(),
        registry_with(vec![weather_tool(counter.clone())]),
    );

    let (_, frames) = drain(service.chat(ask("NYC and SF?")).await.unwrap()).await;

    let steps: Vec<_> = frames
        .iter()
        .filter_map(|f| match f.frame_type {
            FrameType::ToolCall => Some(format!("call:{}", f.tool_call.as_ref()?.id)),
            FrameType::ToolResult => Some(format!("result:{}", f.tool_result.as_ref()?.tool_call_id)),
            _ => None,
        })
        .collect();
    assert_eq!(steps, vec!["call:a", "result:a", "call:b", "result:b"]);
    assert_eq!(counter.get(), 2);

    let roles: Vec<_> = transport.seen()[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Tool]);
}

#[tokio::test]
async fn loop_stops_at_iteration_ceiling() {
    let counter = CallCounter::default();
    let turns = (0..10).map(|i| tool_turn(&[(&*format!("c{i}"), "getWeather", r#"{"city":"NYC"}"#)]));
    let transport = ScriptedTransport::new(turns.collect::<Vec<_>>());
    let config = test_config().with_max_iterations(3);
    let (service, _repo) = service(
        config,
        transport.clone(),
        registry_with(vec![weather_tool(counter.clone())]),
    );

    let (session_id, frames) = drain(service.chat(ask("loop forever")).await.unwrap()).await;

    assert_eq!(transport.calls(), 3);
    assert_eq!(counter.get(), 3);
    assert_eq!(frames.last().map(|f| f.frame_type), Some(FrameType::Done));
    assert_single_final_last(&frames);

    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1, "nothing but the user turn is stored");
}

#[tokio::test]
async fn default_ceiling_is_five_model_calls() {
    let turns = (0..10).map(|i| tool_turn(&[(&*format!("c{i}"), "getWeather", r#"{"city":"NYC"}"#)]));
    let transport = ScriptedTransport::new(turns.collect::<Vec<_>>());
    let (service, _repo) = service(
        test_config(),
        transport.clone(),
        registry_with(vec![weather_tool(CallCounter::default())]),
    );

    let (_, frames) = drain(service.chat(ask("again")).await.unwrap()).await;

    assert_eq!(transport.calls(), 5);
    assert_eq!(frames.iter().filter(|f| f.frame_type == FrameType::ToolCall).count(), 5);
    assert_eq!(frames.last().map(|f| f.frame_type), Some(FrameType::Done));
}

#[tokio::test]
async fn failing_tool_becomes_error_result_and_loop_continues() {
    let counter = CallCounter::default();
    let transport = ScriptedTransport::new([
        tool_turn(&[("c1", "flaky", "{}")]),
        text_turn(&["The service is down, sorry."]),
    ]);
    let (service, _repo) = service(
        test_config(),
        transport.clone(),
        registry_with(vec![failing_tool(counter.clone())]),
    );

    let (session_id, frames) = drain(service.chat(ask("try it")).await.unwrap()).await;

    assert_eq!(
        frame_types(&frames),
        vec![
            FrameType::ToolCall,
            FrameType::ToolResult,
            FrameType::Content,
            FrameType::Done
        ]
    );
    let result = frames[1].tool_result.as_ref().unwrap();
    assert!(!result.success);
    assert_eq!(result.result, json!("Error: backend unavailable"));
    assert_eq!(result.error.as_deref(), Some("backend unavailable"));
    assert!(frames[1].text.starts_with("Error: "));
    assert_eq!(frames[1].text, "Error: backend unavailable");

    let tool_message = &transport.seen()[1].messages[2];
    assert_eq!(tool_message.content, "Error: backend unavailable");

    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.last().unwrap().content, "The service is down, sorry.");
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn unknown_tool_yields_error_text() {
    let transport = ScriptedTransport::new([
        tool_turn(&[("c1", "teleport", r#"{"to":"Mars"}"#)]),
        text_turn(&["I can't do that."]),
    ]);
    let (service, _repo) = service(
        test_config(),
        transport,
        registry_with(vec![weather_tool(CallCounter::default())]),
    );

    let (_, frames) = drain(service.chat(ask("beam me up")).await.unwrap()).await;

    let result = frames[1].tool_result.as_ref().unwrap();
    assert!(!result.success);
    assert_eq!(result.result, json!("Error: Unknown tool: teleport"));
    assert_eq!(frames.last().map(|f| f.frame_type), Some(FrameType::Done));
}

#[tokio::test]
async fn configured_error_prefix_is_used() {
    let transport = ScriptedTransport::new([
        tool_turn(&[("c1", "flaky", "{}")]),
        text_turn(&["ok"]),
    ]);
    let mut config = test_config();
    config.tool_error_prefix = "TOOL FAILED: ".into();
    let (service, _repo) = service(
        config,
        transport,
        registry_with(vec![failing_tool(CallCounter::default())]),
    );

    let (_, frames) = drain(service.chat(ask("x")).await.unwrap()).await;

    let result = frames[1].tool_result.as_ref().unwrap();
    assert_eq!(result.result, json!("TOOL FAILED: backend unavailable"));
    assert!(frames[1].text.starts_with("TOOL FAILED: "));
}

#[tokio::test]
async fn thinking_is_streamed_but_not_stored() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![
        thinking("Let me think"),
        content("42"),
        finish("stop"),
    ])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("meaning of life?")).await.unwrap()).await;

    assert_eq!(
        frame_types(&frames),
        vec![FrameType::Thinking, FrameType::Content, FrameType::Done]
    );
    assert_eq!(frames[0].text, "Let me think");
    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.last().unwrap().content, "42");
}

#[tokio::test]
async fn blank_answer_is_not_stored() {
    let transport = ScriptedTransport::new([text_turn(&["  "])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("say nothing")).await.unwrap()).await;

    assert_eq!(frames.last().map(|f| f.frame_type), Some(FrameType::Done));
    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn stream_ending_without_finish_completes_turn() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![content("partial but fine")])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Content, FrameType::Done]);
    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.last().unwrap().content, "partial but fine");
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![
        Step::Frame("data: {not json".into()),
        content("fine"),
        finish("stop"),
    ])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (_, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Content, FrameType::Done]);
}

#[tokio::test]
async fn transport_error_mid_stream_ends_with_error_frame() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![
        content("par"),
        Step::Fail(ChatError::api(500, "upstream exploded")),
    ])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Content, FrameType::Error]);
    let error = frames.last().unwrap();
    assert_eq!(error.error_code, Some(ClientErrorCode::LlmProviderError));
    assert!(!error.text.contains("upstream exploded"));
    assert_single_final_last(&frames);

    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1, "partial answers are not stored");
}

#[tokio::test]
async fn rejected_key_maps_to_api_key_invalid() {
    let transport = ScriptedTransport::new([Turn::Reject(ChatError::Authentication(
        "bad key".into(),
    ))]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (_, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_type, FrameType::Error);
    assert_eq!(frames[0].error_code, Some(ClientErrorCode::ApiKeyInvalid));
}

#[tokio::test]
async fn missing_model_error_passes_detail_through() {
    let transport = ScriptedTransport::new([Turn::Reject(ChatError::ModelNotFound(
        "gpt-nope".into(),
    ))]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let (_, frames) = drain(service.chat(ask("hi")).await.unwrap()).await;

    assert_eq!(frames[0].error_code, Some(ClientErrorCode::ModelNotFound));
    assert!(frames[0].text.contains("gpt-nope"));
}

#[tokio::test]
async fn aggregation_bound_violation_is_transport_error() {
    let transport = ScriptedTransport::new([tool_turn(&[
        ("a", "getWeather", r#"{"city":"NYC"}"#),
        ("b", "getWeather", r#"{"city":"SF"}"#),
    ])]);
    let mut config = test_config();
    config.max_tool_calls_per_turn = 1;
    let counter = CallCounter::default();
    let (service, _repo) = service(
        config,
        transport,
        registry_with(vec![weather_tool(counter.clone())]),
    );

    let (_, frames) = drain(service.chat(ask("two calls")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Error]);
    assert_eq!(frames[0].error_code, Some(ClientErrorCode::LlmProviderError));
    assert_eq!(counter.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn unopened_stream_times_out() {
    let transport = ScriptedTransport::new([Turn::Hang]);
    let config = test_config().with_response_timeout_secs(5);
    let (service, _repo) = service(config, transport, registry_with(vec![]));

    let (_, frames) = drain(service.chat(ask("hello?")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Error]);
    assert_eq!(frames[0].error_code, Some(ClientErrorCode::ResponseTimeout));
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_times_out() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![content("thinking..."), Step::Stall])]);
    let config = test_config().with_response_timeout_secs(5);
    let (service, _repo) = service(config, transport, registry_with(vec![]));

    let (session_id, frames) = drain(service.chat(ask("hello?")).await.unwrap()).await;

    assert_eq!(frame_types(&frames), vec![FrameType::Content, FrameType::Error]);
    assert_eq!(frames[1].error_code, Some(ClientErrorCode::ResponseTimeout));
    assert_eq!(service.history(&session_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_request_stops_and_stores_nothing() {
    let transport = ScriptedTransport::new([Turn::Stream(vec![content("partial"), Step::Stall])]);
    let (service, _repo) = service(test_config(), transport, registry_with(vec![]));

    let mut handle = service.chat(ask("hi")).await.unwrap();
    let session_id = handle.session_id().to_string();
    let first = handle.next().await.unwrap();
    assert_eq!(first.frame_type, FrameType::Content);

    handle.cancel();
    assert!(handle.next().await.is_none());
    drop(handle);

    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn cancel_during_tool_discards_its_result() {
    let counter = CallCounter::default();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (finished_tx, finished_rx) = tokio::sync::oneshot::channel::<()>();
    let gate = std::sync::Mutex::new((Some(started_tx), release_rx, Some(finished_tx)));
    let tool = {
        let counter = counter.clone();
        std::sync::Arc::new(roci_chat::tools::FnTool::new(
            "slowLookup",
            "Blocks until released",
            roci_chat::tools::ToolParameters::empty(),
            move |_| {
                counter.bump();
                let mut gate = gate.lock().unwrap();
                if let Some(tx) = gate.0.take() {
                    let _ = tx.send(());
                }
                let _ = gate.1.recv();
                if let Some(tx) = gate.2.take() {
                    let _ = tx.send(());
                }
                Ok(json!("looked up"))
            },
        ))
    };
    let transport = ScriptedTransport::new([
        tool_turn(&[("c1", "slowLookup", "{}")]),
        text_turn(&["never requested"]),
    ]);
    let (service, _repo) = service(test_config(), transport.clone(), registry_with(vec![tool]));

    let mut handle = service.chat(ask("look it up")).await.unwrap();
    let session_id = handle.session_id().to_string();
    let first = handle.next().await.unwrap();
    assert_eq!(first.frame_type, FrameType::ToolCall);
    started_rx.await.unwrap();

    handle.cancel();
    assert!(handle.next().await.is_none());
    release_tx.send(()).unwrap();
    finished_rx.await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    drop(handle);

    assert_eq!(counter.get(), 1);
    assert_eq!(transport.calls(), 1);
    let history = service.history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn tools_are_not_advertised_when_disabled() {
    let transport = ScriptedTransport::new([text_turn(&["ok"])]);
    let (service, _repo) = service(
        test_config(),
        transport.clone(),
        registry_with(vec![weather_tool(CallCounter::default())]),
    );
    let request = ChatRequest::builder().user_id(1).message("hi").build();

    drain(service.chat(request).await.unwrap()).await;

    assert!(transport.seen()[0].tools.is_empty());
}

#[tokio::test]
async fn system_prompt_leads_context_but_is_not_stored() {
    let transport = ScriptedTransport::new([text_turn(&["Hi."])]);
    let config = test_config().with_system_prompt("Be brief.");
    let (service, _repo) = service(config, transport.clone(), registry_with(vec![]));

    let (session_id, _) = drain(service.chat(ask("hello")).await.unwrap()).await;

    let seen = &transport.seen()[0];
    assert_eq!(seen.messages[0].role, Role::System);
    assert_eq!(seen.messages[0].content, "Be brief.");
    assert_eq!(seen.messages[1].content, "hello");

    let history = service.history(&session_id).await.unwrap();
    assert!(history.iter().all(|m| m.role != Role::System));
}
