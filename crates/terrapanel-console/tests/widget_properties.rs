#![forbid(unsafe_code)]

//! Behavioural properties of the console widget, driven the way the web
//! shell drives it.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use terrapanel_console::widget::HARD_RESET_PROMPT;
use terrapanel_console::{Control, ConsoleCore, Effect, RequestId, WidgetConfig};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

fn core() -> ConsoleCore {
    ConsoleCore::new("http://127.0.0.1:8080/", WidgetConfig::default()).expect("core")
}

fn drain(core: &mut ConsoleCore) -> Vec<Effect> {
    core.drain_effects().collect()
}

fn posts(effects: &[Effect]) -> Vec<(RequestId, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Post { request, body, .. } => Some((*request, body.clone())),
            _ => None,
        })
        .collect()
}

fn non_blank() -> impl Strategy<Value = String> {
    "[ -~]{0,12}[!-~][ -~]{0,12}"
}

proptest! {
    #[test]
    fn non_blank_submission_echoes_exactly_once_before_outcome(command in non_blank()) {
        let mut core = core();
        core.input_changed(command.clone());
        core.click(Control::Submit);
        let effects = drain(&mut core);

        let appended: Vec<&Effect> = effects
            .iter()
            .filter(|effect| matches!(effect, Effect::AppendLine(_)))
            .collect();
        let expected = Effect::AppendLine(command.clone());
        prop_assert_eq!(appended, vec![&expected]);
        prop_assert_eq!(core.log().lines(), std::slice::from_ref(&command));
        prop_assert_eq!(posts(&effects).len(), 1);
        prop_assert_eq!(core.in_flight(), 1);
        prop_assert_eq!(core.status().flashes(), 0);
    }

    #[test]
    fn blank_submission_is_inert(blank in "[ \t\n]{0,8}") {
        let mut core = core();
        core.input_changed(blank);
        prop_assert!(core.key_up("Enter"));
        prop_assert!(drain(&mut core).is_empty());
        prop_assert!(core.log().is_empty());
        prop_assert_eq!(core.in_flight(), 0);
    }

    #[test]
    fn socket_messages_append_in_arrival_order(messages in prop::collection::vec(".{0,16}", 0..32)) {
        let mut core = core();
        core.socket_opened();
        for message in &messages {
            core.socket_message(message);
        }
        prop_assert_eq!(core.log().lines(), messages.as_slice());
        let appended = drain(&mut core)
            .into_iter()
            .filter(|effect| matches!(effect, Effect::AppendLine(_)))
            .count();
        prop_assert_eq!(appended, messages.len());
    }

    #[test]
    fn rejection_surfaces_error_text_and_skips_completion(error in "[a-zA-Z0-9 :._-]{1,40}") {
        let mut core = core();
        core.click(Control::HardReset);
        core.confirm_resolved(true);
        let (request, _) = posts(&drain(&mut core))[0].clone();

        let body = serde_json::json!({ "msg": "error", "error": error }).to_string();
        core.resolve_body(request, &body);

        let status = core.status().text().unwrap_or_default().to_string();
        prop_assert!(status.contains(&error));
        prop_assert_eq!(core.pending_timers(), 0);
        prop_assert!(!drain(&mut core).contains(&Effect::Reload));
    }
}

#[test]
fn success_without_error_discriminator_shows_generic_status() {
    let mut core = core();
    let request = core.submit("save").expect("request");
    core.resolve_body(request, r#"{"msg":"passed"}"#);
    assert_eq!(core.status().text(), Some("Processed command successfully."));
}

#[test]
fn clear_then_idle_empties_log() {
    let mut core = core();
    core.socket_message("Server started");
    core.input_changed("clear");
    core.key_up("Enter");
    let timer = drain(&mut core)
        .into_iter()
        .find_map(|effect| match effect {
            Effect::StartTimer { timer, .. } => Some(timer),
            _ => None,
        })
        .expect("clear timer");
    core.timer_fired(timer);
    assert!(core.log().is_empty());
}

#[test]
fn clear_then_retype_keeps_log() {
    let mut core = core();
    core.socket_message("Server started");
    core.input_changed("clear");
    core.key_up("Enter");
    let timer = drain(&mut core)
        .into_iter()
        .find_map(|effect| match effect {
            Effect::StartTimer { timer, .. } => Some(timer),
            _ => None,
        })
        .expect("clear timer");
    core.input_changed("d");
    core.input_changed("dusk");
    core.timer_fired(timer);
    assert_eq!(core.log().lines(), ["Server started", "clear"]);
}

#[test]
fn hard_reset_needs_confirmation_and_sends_once() {
    let mut core = core();

    core.click(Control::HardReset);
    assert_eq!(
        drain(&mut core),
        vec![Effect::Confirm {
            prompt: HARD_RESET_PROMPT
        }]
    );
    core.confirm_resolved(false);
    assert!(posts(&drain(&mut core)).is_empty());

    core.click(Control::HardReset);
    core.confirm_resolved(true);
    let sent = posts(&drain(&mut core));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "hardReset");
}

// ── Tracing ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SpanNames {
    names: Vec<String>,
}

struct SpanCapture {
    state: Arc<Mutex<SpanNames>>,
}

impl<S> Layer<S> for SpanCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.names.push(attrs.metadata().name().to_string());
        }
    }
}

#[test]
fn submission_and_outcome_are_traced() {
    let state = Arc::new(Mutex::new(SpanNames::default()));
    let subscriber = tracing_subscriber::registry().with(SpanCapture {
        state: Arc::clone(&state),
    });

    tracing::subscriber::with_default(subscriber, || {
        let mut core = core();
        let request = core.submit("dawn").expect("request");
        core.resolve_body(request, r#"{"msg":"passed"}"#);
    });

    let names = &state.lock().expect("lock").names;
    assert!(names.iter().any(|name| name == "console.submit"), "{names:?}");
    assert!(names.iter().any(|name| name == "console.outcome"), "{names:?}");
}
