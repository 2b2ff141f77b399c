//! Minimal single-stage chatbot graph.
//!
//! One stage reads the `messages` log, sends the latest user message to the
//! model, and appends the reply. Entry and terminal are the same stage.

use std::sync::Arc;

use serde_json::json;

use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::TextCompleter;
use trellis_graph::{CompiledGraph, GraphBuilder, StateRecord, StateSchema, StateUpdate};

pub fn chat_schema() -> StateSchema {
    StateSchema::new().append_only("messages")
}

pub fn initial_state(prompt: &str) -> StateRecord {
    let mut state = StateRecord::new();
    state.set("messages", json!([{"role": "user", "content": prompt}]));
    state
}

pub fn build_chat_graph(completer: Arc<dyn TextCompleter>) -> Result<CompiledGraph> {
    let mut builder = GraphBuilder::new(chat_schema());

    builder.register(
        "chatbot",
        Box::new(move |state: &StateRecord| {
            let prompt = state
                .get("messages")
                .and_then(|m| m.as_array())
                .and_then(|m| m.last())
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .ok_or_else(|| TrellisError::Stage {
                    stage: "chatbot".to_string(),
                    message: "no user message to respond to".to_string(),
                })?;

            let reply = completer.complete(prompt)?;
            Ok(StateUpdate::none().with(
                "messages",
                json!([{"role": "assistant", "content": reply}]),
            ))
        }),
    )?;

    builder.set_entry("chatbot")?;
    builder.mark_terminal("chatbot")?;
    builder.compile()
}

/// The assistant's latest reply from a finished run.
pub fn last_reply(state: &StateRecord) -> Option<String> {
    state
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.last())
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(String::from)
}
