// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end scenarios: host commands in, replies and events out, against
// the in-memory SDK.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use imbridge_core::BridgeConfig;
use imbridge_core::error::{BridgeError, SdkException};
use imbridge_core::types::{CachePolicy, ChannelEvent, MethodCall};
use imbridge_plugin::hooks::{
    ON_CONNECTION_PAUSED, ON_CONNECTION_RESUMED, ON_KICKED, ON_MESSAGE,
    ON_UNREAD_MESSAGES_COUNT_UPDATED,
};
use imbridge_plugin::{Outcome, Plugin, Reply};
use imbridge_sdk::{MemorySdk, SdkOp};

fn plugin(sdk: &MemorySdk) -> Plugin {
    Plugin::new(
        Arc::new(sdk.clone()),
        BridgeConfig::default(),
        Handle::current(),
    )
}

async fn invoke(plugin: &Plugin, method: &str, arguments: Value) -> Outcome {
    let (reply, rx) = Reply::channel();
    plugin
        .on_method_call(MethodCall::new(method, arguments), reply)
        .expect("command dispatched");
    rx.await.expect("reply delivered")
}

/// Drain every event currently queued, as `(tag, data)` pairs.
fn drain(rx: &mut UnboundedReceiver<ChannelEvent>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            ChannelEvent::Success(payload) => out.push((
                payload["event"].as_str().unwrap_or_default().to_string(),
                payload["data"].clone(),
            )),
            ChannelEvent::Failure(err) => panic!("unexpected failure event: {err}"),
        }
    }
    out
}

fn tags(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(tag, _)| tag.as_str()).collect()
}

#[tokio::test]
async fn events_before_listen_are_replayed_in_order() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);
    invoke(&plugin, "avIMClient_getInstance", json!("u1"))
        .await
        .expect("getInstance");

    sdk.emit_connection_paused("u1");
    sdk.emit_connection_resumed("u1");
    sdk.emit_kicked("u1", "c1", "u2");
    assert_eq!(plugin.events().buffered_len(), 3);

    let mut rx = plugin.events().subscribe();
    sdk.emit_connection_paused("u1");

    let events = drain(&mut rx);
    assert_eq!(
        tags(&events),
        vec![
            ON_CONNECTION_PAUSED,
            ON_CONNECTION_RESUMED,
            ON_KICKED,
            ON_CONNECTION_PAUSED
        ]
    );
    let kicked = &events[2].1;
    assert_eq!(kicked["clientId"], "u1");
    assert_eq!(kicked["kickedBy"], "u2");
    assert_eq!(kicked["conversation"]["members"], json!(["u2"]));
}

#[tokio::test]
async fn get_instance_twice_installs_hooks_once() {
    let sdk = MemorySdk::new();
    let plugin = plugin(&sdk);
    for _ in 0..2 {
        let result = invoke(&plugin, "avIMClient_getInstance", json!("u1")).await;
        assert_eq!(result.expect("getInstance"), Value::Null);
    }

    assert_eq!(plugin.registry().session_count(), 1);
    let client = sdk.existing_client("u1").expect("client created");
    assert_eq!(client.handler_installs(), 2);

    let mut rx = plugin.events().subscribe();
    sdk.emit_connection_resumed("u1");
    assert_eq!(tags(&drain(&mut rx)), vec![ON_CONNECTION_RESUMED]);
}

#[tokio::test]
async fn get_instance_without_id_is_invalid_args() {
    let sdk = MemorySdk::new();
    let plugin = plugin(&sdk);
    let err = invoke(&plugin, "avIMClient_getInstance", Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.code, "INVALID_ARGS");
    assert_eq!(err.message, "clientId cannot be nil");
    assert_eq!(plugin.registry().session_count(), 0);
}

#[tokio::test]
async fn double_register_yields_one_event_per_message() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);
    let mut rx = plugin.events().subscribe();

    for _ in 0..2 {
        let result = invoke(&plugin, "avIMClient_registerMessageHandler", Value::Null).await;
        assert_eq!(result.expect("register"), Value::Null);
    }
    sdk.deliver_message("u1", "c1", "u2", "hi").expect("delivered");

    let events = drain(&mut rx);
    assert_eq!(tags(&events), vec![ON_MESSAGE]);
    let data = &events[0].1;
    assert_eq!(data["clientId"], "u1");
    assert_eq!(data["message"]["content"], "hi");
    assert_eq!(data["message"]["from"], "u2");
    assert_eq!(data["conversation"]["conversationId"], "c1");
    assert_eq!(data["conversation"]["unreadMessagesCount"], 1);
}

#[tokio::test]
async fn unregister_stops_message_events() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);
    let mut rx = plugin.events().subscribe();

    invoke(&plugin, "avIMClient_registerMessageHandler", Value::Null)
        .await
        .expect("register");
    invoke(&plugin, "avIMClient_unregisterMessageHandler", Value::Null)
        .await
        .expect("unregister");
    invoke(&plugin, "avIMClient_unregisterMessageHandler", Value::Null)
        .await
        .expect("unregister again");
    sdk.deliver_message("u1", "c1", "u2", "nobody listens");

    assert!(drain(&mut rx).is_empty());
    assert!(!sdk.has_message_handler());
}

#[tokio::test]
async fn lone_msg_id_falls_back_to_most_recent() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let seeded: Vec<_> = (0..5)
        .map(|i| sdk.seed_message("c1", "u2", &format!("m{i}")).expect("seed"))
        .collect();
    let plugin = plugin(&sdk);

    let value = invoke(
        &plugin,
        "avIMConversation_queryMessages",
        json!({
            "clientId": "u1",
            "conversationId": "c1",
            "msgId": seeded[1].message_id,
            "limit": 2,
        }),
    )
    .await
    .expect("queryMessages");

    let contents: Vec<_> = value
        .as_array()
        .expect("list")
        .iter()
        .map(|m| m["content"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(contents, vec!["m3", "m4"]);
}

#[tokio::test]
async fn full_cursor_pages_backwards() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let seeded: Vec<_> = (0..5)
        .map(|i| sdk.seed_message("c1", "u2", &format!("m{i}")).expect("seed"))
        .collect();
    let plugin = plugin(&sdk);

    let value = invoke(
        &plugin,
        "avIMConversation_queryMessages",
        json!({
            "clientId": "u1",
            "conversationId": "c1",
            "msgId": seeded[3].message_id,
            "timestamp": seeded[3].timestamp,
            "limit": 10,
        }),
    )
    .await
    .expect("queryMessages");

    let contents: Vec<_> = value
        .as_array()
        .expect("list")
        .iter()
        .map(|m| m["content"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(contents, vec!["m0", "m1", "m2"]);
}

#[tokio::test]
async fn cleared_buffer_replays_nothing() {
    let sdk = MemorySdk::new();
    let plugin = plugin(&sdk);
    invoke(&plugin, "avIMClient_getInstance", json!("u1"))
        .await
        .expect("getInstance");
    sdk.emit_connection_paused("u1");
    sdk.emit_connection_resumed("u1");

    let cleared = invoke(&plugin, "_clearEventBuffer", Value::Null).await;
    assert_eq!(cleared.expect("clear"), Value::Null);

    let mut rx = plugin.events().subscribe();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn detached_listener_misses_nothing_after_reattach() {
    let sdk = MemorySdk::new();
    let plugin = plugin(&sdk);
    invoke(&plugin, "avIMClient_getInstance", json!("u1"))
        .await
        .expect("getInstance");

    let mut first = plugin.events().subscribe();
    sdk.emit_connection_paused("u1");
    plugin.on_cancel();
    sdk.emit_connection_resumed("u1");

    assert_eq!(tags(&drain(&mut first)), vec![ON_CONNECTION_PAUSED]);
    let mut second = plugin.events().subscribe();
    assert_eq!(tags(&drain(&mut second)), vec![ON_CONNECTION_RESUMED]);
}

#[tokio::test]
async fn conversation_without_last_message_has_null_key() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);

    let value = invoke(
        &plugin,
        "avIMClient_queryConversations",
        json!({"clientId": "u1", "ids": ["c1"], "refreshLastMessage": true}),
    )
    .await
    .expect("queryConversations");

    let conversation = value[0].as_object().expect("map");
    assert!(conversation.contains_key("lastMessage"));
    assert!(conversation["lastMessage"].is_null());
    assert!(conversation["lastMessageAt"].is_null());
}

#[tokio::test]
async fn query_conversations_with_refresh() {
    let sdk = MemorySdk::new();
    for id in ["c1", "c2", "c3"] {
        sdk.seed_conversation(id, &["u1", "u2"]);
        sdk.seed_message(id, "u2", &format!("last in {id}")).expect("seed");
    }
    let plugin = plugin(&sdk);

    let value = invoke(
        &plugin,
        "avIMClient_queryConversations",
        json!({
            "clientId": "u1",
            "ids": ["c1", "c2"],
            "refreshLastMessage": true,
            "cachePolicy": null,
            "limit": 10,
        }),
    )
    .await
    .expect("queryConversations");

    let list = value.as_array().expect("list");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["conversationId"], "c1");
    assert_eq!(list[1]["conversationId"], "c2");
    for conversation in list {
        let id = conversation["conversationId"].as_str().expect("id");
        assert_eq!(conversation["lastMessage"]["content"], format!("last in {id}"));
        assert!(conversation["lastMessageAt"].is_i64());
    }
}

#[tokio::test]
async fn limit_bounds_conversation_count() {
    let sdk = MemorySdk::new();
    for id in ["c3", "c1", "c2"] {
        sdk.seed_conversation(id, &["u1", "u2"]);
    }
    let plugin = plugin(&sdk);

    let value = invoke(
        &plugin,
        "avIMClient_queryConversations",
        json!({"clientId": "u1", "ids": ["c3", "c2", "c1"], "limit": 2}),
    )
    .await
    .expect("queryConversations");

    let ids: Vec<_> = value
        .as_array()
        .expect("list")
        .iter()
        .map(|c| c["conversationId"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

#[tokio::test]
async fn cache_policy_reaches_sdk() {
    let sdk = MemorySdk::new();
    for id in ["c1", "c2", "c3"] {
        sdk.seed_conversation(id, &["u1", "u2"]);
    }
    let plugin = plugin(&sdk);
    let query = json!({
        "clientId": "u1",
        "ids": ["c1", "c2", "c3"],
        "cachePolicy": 1,
        "limit": 2,
    });

    // Nothing cached yet: a cache-only query finds nothing.
    let cold = invoke(&plugin, "avIMClient_queryConversations", query.clone())
        .await
        .expect("queryConversations");
    assert_eq!(cold, json!([]));
    let client = sdk.existing_client("u1").expect("client");
    let seen = client.last_query().expect("query recorded");
    assert_eq!(seen.cache_policy, Some(CachePolicy::CacheOnly));
    assert_eq!(seen.limit, Some(2));

    invoke(
        &plugin,
        "avIMConversation_read",
        json!({"clientId": "u1", "conversationId": "c3"}),
    )
    .await
    .expect("read");
    let warm = invoke(&plugin, "avIMClient_queryConversations", query)
        .await
        .expect("queryConversations");
    assert_eq!(warm.as_array().expect("list").len(), 1);
    assert_eq!(warm[0]["conversationId"], "c3");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_instance_installs_hooks_once() {
    let sdk = MemorySdk::new();
    let plugin = Arc::new(plugin(&sdk));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let plugin = plugin.clone();
            tokio::spawn(async move {
                invoke(&plugin, "avIMClient_getInstance", json!("u1")).await
            })
        })
        .collect();
    for task in tasks {
        let result = task.await.expect("task joined");
        assert_eq!(result.expect("getInstance"), Value::Null);
    }

    assert_eq!(plugin.registry().session_count(), 1);
    let client = sdk.existing_client("u1").expect("client created");
    assert_eq!(client.handler_installs(), 2);
}

#[tokio::test]
async fn send_failure_reports_message_and_exception() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    sdk.fail_next(SdkOp::SendMessage, SdkException::new(141, "network timeout"));
    let plugin = plugin(&sdk);

    let err = invoke(
        &plugin,
        "avIMConversation_sendMessage",
        json!({"clientId": "u1", "conversationId": "c1", "content": "hello"}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code, "ERROR");
    assert_eq!(err.message, "send message failed");
    assert_eq!(err.details["exception"]["code"], 141);
    assert_eq!(err.details["exception"]["message"], "network timeout");
    assert_eq!(err.details["message"]["content"], "hello");
    assert_eq!(err.details["message"]["status"], 4);
}

#[tokio::test]
async fn sent_message_reaches_history() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);

    let sent = invoke(
        &plugin,
        "avIMConversation_sendMessage",
        json!({"clientId": "u1", "conversationId": "c1", "content": "hello"}),
    )
    .await
    .expect("sendMessage");

    let history = invoke(
        &plugin,
        "avIMConversation_queryMessages",
        json!({"clientId": "u2", "conversationId": "c1", "limit": 1}),
    )
    .await
    .expect("queryMessages");
    assert_eq!(history[0]["messageId"], sent["messageId"]);
    assert_eq!(history[0]["from"], "u1");
}

#[tokio::test]
async fn read_resets_unread_and_notifies() {
    let sdk = MemorySdk::new();
    sdk.seed_conversation("c1", &["u1", "u2"]);
    let plugin = plugin(&sdk);
    invoke(&plugin, "avIMClient_getInstance", json!("u1"))
        .await
        .expect("getInstance");
    sdk.deliver_message("u1", "c1", "u2", "one");
    sdk.deliver_message("u1", "c1", "u2", "two");

    let mut rx = plugin.events().subscribe();
    let result = invoke(
        &plugin,
        "avIMConversation_read",
        json!({"clientId": "u1", "conversationId": "c1"}),
    )
    .await;
    assert_eq!(result.expect("read"), Value::Null);

    let events = drain(&mut rx);
    assert_eq!(tags(&events), vec![ON_UNREAD_MESSAGES_COUNT_UPDATED]);
    assert_eq!(events[0].1["conversation"]["unreadMessagesCount"], 0);
}

#[tokio::test]
async fn unknown_command_is_fatal() {
    let sdk = MemorySdk::new();
    let plugin = plugin(&sdk);
    let (reply, rx) = Reply::channel();

    let err = plugin
        .on_method_call(MethodCall::new("foo_bar", json!({})), reply)
        .unwrap_err();

    assert!(matches!(err, BridgeError::NotImplemented(ref m) if m == "foo_bar"));
    // The reply was dropped unanswered.
    assert!(rx.await.is_err());
}
