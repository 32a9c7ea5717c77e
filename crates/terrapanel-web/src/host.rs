//! The seam between the widget core and whatever renders it.

use std::time::Duration;

use terrapanel_console::{ConsoleCore, Effect, RequestId, TimerId};
use tracing::trace;

/// Everything the widget asks of its page.
///
/// Network and timer methods start work and return immediately; the host
/// reports completion back into the core later.
pub trait DomHost {
    /// Append `text` plus a line break to the log and scroll it to the end.
    fn append_line(&mut self, text: &str);
    fn clear_log(&mut self);
    /// Replace the status text and restart its flash animation.
    fn flash_status(&mut self, text: &str);
    fn set_modal_visible(&mut self, visible: bool);
    fn focus_input(&mut self);
    fn set_input(&mut self, value: &str);
    fn post(&mut self, request: RequestId, url: &str, body: &str);
    fn start_timer(&mut self, timer: TimerId, delay: Duration);
    /// Blocking yes/no prompt.
    fn confirm(&mut self, prompt: &str) -> bool;
    fn reload(&mut self);
}

/// Apply queued effects until the core has nothing left to say.
///
/// Confirmation answers are fed straight back, so a confirmed hard reset
/// is posted within the same pump. Returns the number of effects applied.
pub fn pump<H: DomHost + ?Sized>(core: &mut ConsoleCore, host: &mut H) -> usize {
    let mut applied = 0_usize;
    loop {
        let batch: Vec<Effect> = core.drain_effects().collect();
        if batch.is_empty() {
            return applied;
        }
        for effect in batch {
            applied = applied.saturating_add(1);
            trace!(?effect, "apply");
            match effect {
                Effect::AppendLine(text) => host.append_line(&text),
                Effect::ClearLog => host.clear_log(),
                Effect::FlashStatus(text) => host.flash_status(&text),
                Effect::ShowModal => host.set_modal_visible(true),
                Effect::HideModal => host.set_modal_visible(false),
                Effect::FocusInput => host.focus_input(),
                Effect::SetInput(value) => host.set_input(&value),
                Effect::Post { request, url, body } => host.post(request, &url, &body),
                Effect::StartTimer { timer, delay } => host.start_timer(timer, delay),
                Effect::Confirm { prompt } => {
                    let accepted = host.confirm(prompt);
                    core.confirm_resolved(accepted);
                }
                Effect::Reload => host.reload(),
            }
        }
    }
}
