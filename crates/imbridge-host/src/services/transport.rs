// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines transport.
//
// Input, one object per line:
//   {"id": <any>, "method": "avIMClient_getInstance", "arguments": ...}
//   {"listen": true} / {"listen": false}
// Output, one object per line, through a single ordered writer:
//   {"id": <id>, "result": ...} / {"id": <id>, "error": {code, message, details}}
//   {"event": <tag>, "data": ...} / {"eventError": {code, message, details}}

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use imbridge_core::error::{ChannelError, INVALID_ARGS, Result};
use imbridge_core::types::{ChannelEvent, MethodCall};
use imbridge_plugin::{EventSink, Outcome, Plugin, Reply};

/// Queue of serialized output lines.
pub type LineSender = mpsc::UnboundedSender<String>;

/// One line of host input.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HostLine {
    Listen {
        listen: bool,
    },
    Call {
        id: Value,
        method: String,
        #[serde(default)]
        arguments: Value,
    },
}

pub fn reply_line(id: &Value, outcome: &Outcome) -> Value {
    match outcome {
        Ok(result) => json!({ "id": id, "result": result }),
        Err(error) => json!({ "id": id, "error": error }),
    }
}

pub fn event_line(event: &ChannelEvent) -> Value {
    match event {
        ChannelEvent::Success(payload) => payload.clone(),
        ChannelEvent::Failure(error) => json!({ "eventError": error }),
    }
}

fn send_line(out: &LineSender, line: Value) {
    if out.send(line.to_string()).is_err() {
        debug!("output writer closed, line dropped");
    }
}

/// Event listener that writes to the output queue.
pub struct LineSink {
    out: LineSender,
}

impl LineSink {
    pub fn new(out: LineSender) -> Self {
        Self { out }
    }
}

impl EventSink for LineSink {
    fn deliver(&self, event: ChannelEvent) {
        send_line(&self.out, event_line(&event));
    }
}

fn reply_to(id: Value, out: LineSender) -> Reply {
    Reply::from_fn(move |outcome| send_line(&out, reply_line(&id, &outcome)))
}

/// Feed every input line to `plugin` until end of input.
///
/// Returns the dispatch error for a command no handler implements; the
/// caller is expected to terminate.
pub async fn serve<R>(plugin: &Plugin, input: R, out: &LineSender) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostLine>(line) {
            Ok(HostLine::Listen { listen: true }) => {
                plugin.on_listen(Arc::new(LineSink::new(out.clone())));
            }
            Ok(HostLine::Listen { listen: false }) => plugin.on_cancel(),
            Ok(HostLine::Call {
                id,
                method,
                arguments,
            }) => {
                plugin.on_method_call(MethodCall::new(method, arguments), reply_to(id, out.clone()))?;
            }
            Err(e) => {
                warn!(error = %e, "unparseable input line");
                let error = ChannelError::new(INVALID_ARGS, e.to_string(), Value::Null);
                send_line(out, json!({ "id": null, "error": error }));
            }
        }
    }
    info!("input closed");
    Ok(())
}

/// Drain the output queue into `writer`, one line per entry, until every
/// sender is gone.
pub async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<String>, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;
    use tokio::runtime::Handle;

    use super::*;
    use imbridge_core::{BridgeConfig, BridgeError};
    use imbridge_plugin::hooks::ON_CONNECTION_RESUMED;
    use imbridge_sdk::MemorySdk;

    fn plugin(sdk: &MemorySdk) -> Plugin {
        Plugin::new(
            Arc::new(sdk.clone()),
            BridgeConfig::default(),
            Handle::current(),
        )
    }

    async fn next_line(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let line = rx.recv().await.expect("output line");
        serde_json::from_str(&line).expect("valid json")
    }

    #[test]
    fn host_lines_parse() {
        let call: HostLine =
            serde_json::from_str(r#"{"id": 7, "method": "avIMClient_registerMessageHandler"}"#)
                .expect("call");
        assert_eq!(
            call,
            HostLine::Call {
                id: json!(7),
                method: "avIMClient_registerMessageHandler".into(),
                arguments: Value::Null,
            }
        );
        let listen: HostLine = serde_json::from_str(r#"{"listen": false}"#).expect("listen");
        assert_eq!(listen, HostLine::Listen { listen: false });
    }

    #[tokio::test]
    async fn commands_and_events_become_lines() {
        let sdk = MemorySdk::new();
        let plugin = plugin(&sdk);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = concat!(
            r#"{"id": 1, "method": "avIMClient_getInstance", "arguments": "u1"}"#,
            "\n\n",
            r#"{"listen": true}"#,
            "\n",
        );

        serve(&plugin, BufReader::new(input.as_bytes()), &tx)
            .await
            .expect("serve");
        assert_eq!(next_line(&mut rx).await, json!({ "id": 1, "result": null }));

        sdk.emit_connection_resumed("u1");
        let event = next_line(&mut rx).await;
        assert_eq!(event["event"], ON_CONNECTION_RESUMED);
        assert_eq!(event["data"]["clientId"], "u1");
    }

    #[tokio::test]
    async fn malformed_line_gets_error_reply() {
        let sdk = MemorySdk::new();
        let plugin = plugin(&sdk);
        let (tx, mut rx) = mpsc::unbounded_channel();

        serve(&plugin, BufReader::new("not json\n".as_bytes()), &tx)
            .await
            .expect("serve");
        let line = next_line(&mut rx).await;
        assert!(line["id"].is_null());
        assert_eq!(line["error"]["code"], INVALID_ARGS);
    }

    #[tokio::test]
    async fn unknown_method_stops_serving() {
        let sdk = MemorySdk::new();
        let plugin = plugin(&sdk);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = concat!(
            r#"{"id": 1, "method": "foo_bar"}"#,
            "\n",
            r#"{"id": 2, "method": "avIMClient_getInstance", "arguments": "u1"}"#,
            "\n",
        );

        let err = serve(&plugin, BufReader::new(input.as_bytes()), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented(_)));
        drop(tx);
        assert!(rx.recv().await.is_none());
        assert_eq!(plugin.registry().session_count(), 0);
    }

    #[tokio::test]
    async fn writer_emits_one_line_per_entry() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("{\"a\":1}".to_string()).expect("send");
        tx.send("{\"b\":2}".to_string()).expect("send");
        drop(tx);

        let mut buf = Vec::new();
        write_lines(rx, &mut buf).await.expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "{\"a\":1}\n{\"b\":2}\n");
    }
}
