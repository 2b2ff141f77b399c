//! Email triage pipeline built on the stage routing graph.
//!
//! read_email → classify_email → (spam? handle_spam : draft_response → notify)
//!
//! Classification and drafting call the configured model through the
//! `TextCompleter` boundary; everything else is plain state threading.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::TextCompleter;
use trellis_graph::{CompiledGraph, GraphBuilder, StateRecord, StateSchema, StateUpdate};

/// An incoming email to triage.
#[derive(Debug, Clone)]
pub struct Email {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// State fields for the triage graph; `messages` is an append-only
/// conversation log.
pub fn email_schema() -> StateSchema {
    StateSchema::new().append_only("messages")
}

/// Initial state for one triage run.
pub fn initial_state(email: &Email) -> StateRecord {
    let mut state = StateRecord::new();
    state.set(
        "email",
        json!({
            "sender": email.sender,
            "subject": email.subject,
            "body": email.body,
        }),
    );
    state.set("messages", json!([]));
    state
}

fn email_field<'a>(state: &'a StateRecord, stage: &str, field: &str) -> Result<&'a str> {
    state
        .get("email")
        .and_then(|e| e.get(field))
        .and_then(|v| v.as_str())
        .ok_or_else(|| TrellisError::Stage {
            stage: stage.to_string(),
            message: format!("state field 'email.{}' is not set", field),
        })
}

fn classification_prompt(sender: &str, subject: &str, body: &str) -> String {
    format!(
        "You are an assistant triaging incoming email.\n\
         Decide whether the following email is spam or a legitimate message\n\
         that deserves the recipient's attention.\n\n\
         Email:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Answer with exactly one word: SPAM or HAM."
    )
}

fn drafting_prompt(sender: &str, subject: &str, body: &str) -> String {
    format!(
        "You are an assistant drafting a polite preliminary reply to this email.\n\n\
         Email:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Draft a brief, professional response the recipient can review and\n\
         personalize before sending."
    )
}

/// Build and compile the triage graph.
///
/// Pure construction: nothing runs until `CompiledGraph::run` is called.
pub fn build_triage_graph(completer: Arc<dyn TextCompleter>) -> Result<CompiledGraph> {
    let mut builder = GraphBuilder::new(email_schema());

    builder.register(
        "read_email",
        Box::new(|state: &StateRecord| {
            let sender = email_field(state, "read_email", "sender")?;
            let subject = email_field(state, "read_email", "subject")?;
            info!(sender = %sender, subject = %subject, "processing email");
            Ok(StateUpdate::none())
        }),
    )?;

    let classify_completer = Arc::clone(&completer);
    builder.register(
        "classify_email",
        Box::new(move |state: &StateRecord| {
            let sender = email_field(state, "classify_email", "sender")?;
            let subject = email_field(state, "classify_email", "subject")?;
            let body = email_field(state, "classify_email", "body")?;

            let prompt = classification_prompt(sender, subject, body);
            let response = classify_completer.complete(&prompt)?;
            let verdict = response.trim().to_lowercase();
            let is_spam = verdict.contains("spam") && !verdict.contains("ham");
            info!(is_spam, verdict = %verdict, "classified email");

            let mut update = StateUpdate::none().with("is_spam", json!(is_spam));
            if !is_spam {
                update = update.with(
                    "messages",
                    json!([
                        {"role": "user", "content": prompt},
                        {"role": "assistant", "content": response},
                    ]),
                );
            }
            Ok(update)
        }),
    )?;

    builder.register(
        "handle_spam",
        Box::new(|_: &StateRecord| {
            info!("email moved to the spam folder");
            Ok(StateUpdate::none())
        }),
    )?;

    let draft_completer = Arc::clone(&completer);
    builder.register(
        "draft_response",
        Box::new(move |state: &StateRecord| {
            let sender = email_field(state, "draft_response", "sender")?;
            let subject = email_field(state, "draft_response", "subject")?;
            let body = email_field(state, "draft_response", "body")?;

            let prompt = drafting_prompt(sender, subject, body);
            let response = draft_completer.complete(&prompt)?;

            Ok(StateUpdate::none()
                .with("draft_response", json!(response))
                .with(
                    "messages",
                    json!([
                        {"role": "user", "content": prompt},
                        {"role": "assistant", "content": response},
                    ]),
                ))
        }),
    )?;

    builder.register(
        "notify",
        Box::new(|state: &StateRecord| {
            let sender = email_field(state, "notify", "sender")?;
            let subject = email_field(state, "notify", "subject")?;
            let draft = state.get_str("draft_response").unwrap_or_default();

            println!("{}", "=".repeat(50));
            println!("New email from {sender}");
            println!("Subject: {subject}");
            println!("\nDraft response for your review:");
            println!("{}", "-".repeat(50));
            println!("{draft}");
            println!("{}", "=".repeat(50));

            Ok(StateUpdate::none())
        }),
    )?;

    builder.add_edge("read_email", "classify_email")?;
    builder.add_conditional_edge(
        "classify_email",
        Box::new(|state: &StateRecord| {
            let is_spam = state.get_bool("is_spam").ok_or_else(|| TrellisError::Stage {
                stage: "route_email".to_string(),
                message: "state field 'is_spam' is not set".to_string(),
            })?;
            Ok(if is_spam { "spam" } else { "legitimate" }.to_string())
        }),
        HashMap::from([
            ("spam".to_string(), "handle_spam".to_string()),
            ("legitimate".to_string(), "draft_response".to_string()),
        ]),
    )?;
    builder.add_edge("draft_response", "notify")?;

    builder.set_entry("read_email")?;
    builder.mark_terminal("handle_spam")?;
    builder.mark_terminal("notify")?;

    builder.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Completer that classifies by keyword and otherwise echoes a draft.
    struct StubCompleter;

    impl TextCompleter for StubCompleter {
        fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("SPAM or HAM") {
                if prompt.contains("crypto") {
                    Ok("SPAM".to_string())
                } else {
                    Ok("HAM".to_string())
                }
            } else {
                Ok("Thank you for reaching out; we will reply shortly.".to_string())
            }
        }
    }

    /// Completer whose every call fails.
    struct FailingCompleter;

    impl TextCompleter for FailingCompleter {
        fn complete(&self, _prompt: &str) -> Result<String> {
            Err(TrellisError::Llm("connection refused".to_string()))
        }
    }

    fn spam_email() -> Email {
        Email {
            sender: "promo@example.com".to_string(),
            subject: "The best investment of the year".to_string(),
            body: "I just launched a crypto coin and want you to buy some!".to_string(),
        }
    }

    fn legitimate_email() -> Email {
        Email {
            sender: "partner@example.com".to_string(),
            subject: "Quarterly review".to_string(),
            body: "Could we schedule the review for Thursday?".to_string(),
        }
    }

    #[test]
    fn test_spam_path_skips_drafting() {
        let plan = build_triage_graph(Arc::new(StubCompleter)).unwrap();
        let final_state = plan.run(initial_state(&spam_email())).unwrap();

        assert_eq!(final_state.get_bool("is_spam"), Some(true));
        assert!(final_state.get("draft_response").is_none());
        // spam path appends nothing to the conversation log
        assert_eq!(
            final_state.get("messages").unwrap().as_array().unwrap().len(),
            0
        );
    }

    #[test]
    fn test_legitimate_path_reaches_notify_with_draft() {
        let plan = build_triage_graph(Arc::new(StubCompleter)).unwrap();
        let final_state = plan.run(initial_state(&legitimate_email())).unwrap();

        assert_eq!(final_state.get_bool("is_spam"), Some(false));
        let draft = final_state.get_str("draft_response").unwrap();
        assert!(!draft.is_empty());
        // classify and draft each append a user/assistant pair
        assert_eq!(
            final_state.get("messages").unwrap().as_array().unwrap().len(),
            4
        );
    }

    #[test]
    fn test_completer_failure_aborts_run() {
        let plan = build_triage_graph(Arc::new(FailingCompleter)).unwrap();
        let err = plan.run(initial_state(&legitimate_email())).unwrap_err();
        assert!(matches!(err, TrellisError::Llm(_)));
    }

    #[test]
    fn test_missing_email_field_is_reported() {
        let plan = build_triage_graph(Arc::new(StubCompleter)).unwrap();
        let err = plan.run(StateRecord::new()).unwrap_err();
        match err {
            TrellisError::Stage { message, .. } => assert!(message.contains("email")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_concurrent_runs_do_not_share_state() {
        let plan = build_triage_graph(Arc::new(StubCompleter)).unwrap();

        std::thread::scope(|scope| {
            let spam = scope.spawn(|| plan.run(initial_state(&spam_email())).unwrap());
            let legit = scope.spawn(|| plan.run(initial_state(&legitimate_email())).unwrap());

            let spam_state = spam.join().unwrap();
            let legit_state = legit.join().unwrap();

            assert_eq!(spam_state.get_bool("is_spam"), Some(true));
            assert!(spam_state.get("draft_response").is_none());
            assert_eq!(legit_state.get_bool("is_spam"), Some(false));
            assert!(legit_state.get_str("draft_response").is_some());
        });
    }
}
