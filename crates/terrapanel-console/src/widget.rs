//! The console widget state machine.
//!
//! [`ConsoleCore`] owns the log, the status indicator, the mirrored input
//! field and the bookkeeping for in-flight requests and timers. Hosts call
//! the event methods and then drain [`Effect`]s in order.
//!
//! # Invariants
//!
//! 1. **Optimistic echo**: a non-blank submission appends exactly one log
//!    line and queues exactly one [`Effect::Post`], in that order, before
//!    any outcome is known.
//! 2. **Blank input is inert**: a blank submission queues nothing.
//! 3. **Outcomes are independent**: submissions are never ordered against
//!    each other; the status reflects whichever resolves last.
//! 4. **Rejections stop**: an application-level error never runs the
//!    submission's completion.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::{debug, debug_span, warn};

use crate::config::{HardResetMode, WidgetConfig};
use crate::control::{CLEAR_COMMAND, Control, ElementId, HARD_RESET_COMMAND};
use crate::endpoint::Endpoints;
use crate::error::Result;
use crate::log::ConsoleLog;
use crate::reply::{SubmissionFailure, SubmissionOutcome, parse_reply};
use crate::status::StatusIndicator;

pub const HARD_RESET_PROMPT: &str = "This will reboot the server WITHOUT SAVING. Are you sure?";
pub const HARD_RESET_ISSUING_STATUS: &str = "Issuing hard reset ...";
pub const HARD_RESET_FAILED_STATUS: &str = "Hard reset failed.";
pub const SOCKET_CLOSED_NOTICE: &str = "Connection to the server console was closed.";

/// Identifies one command submission for the host's fetch bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u32);

impl RequestId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Identifies one host timer (`setTimeout`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u32);

impl TimerId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Follow-up attached to a submission, run once its outcome is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Count down and reload the page on success, report failure otherwise.
    ReloadAfterHardReset,
}

/// What a completion is told about its submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Fail,
}

/// Lifecycle of the single console socket. There is no reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

/// Work the host must perform, in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append `text` and a line break to `console`, then scroll it to the end.
    AppendLine(String),
    /// Empty `console`.
    ClearLog,
    /// Replace the `command-status` text and restart its flash animation.
    FlashStatus(String),
    ShowModal,
    HideModal,
    FocusInput,
    /// Overwrite the `command-line` value.
    SetInput(String),
    /// `POST url` with `body` as the raw request body. Report the outcome via
    /// [`ConsoleCore::resolve_body`] or [`ConsoleCore::resolve_transport_error`].
    Post {
        request: RequestId,
        url: String,
        body: String,
    },
    /// Call [`ConsoleCore::timer_fired`] after `delay`.
    StartTimer { timer: TimerId, delay: Duration },
    /// Ask the user; answer via [`ConsoleCore::confirm_resolved`].
    Confirm { prompt: &'static str },
    /// Reload the page.
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPurpose {
    ClearIfUntouched,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingConfirm {
    HardReset,
}

#[derive(Debug, Clone)]
struct PendingSubmission {
    command: String,
    completion: Option<Completion>,
}

/// Host-driven console widget.
#[derive(Debug)]
pub struct ConsoleCore {
    config: WidgetConfig,
    endpoints: Endpoints,
    log: ConsoleLog,
    status: StatusIndicator,
    input: String,
    modal_open: bool,
    socket: SocketState,
    awaiting_confirm: Option<PendingConfirm>,
    pending: BTreeMap<RequestId, PendingSubmission>,
    timers: BTreeMap<TimerId, TimerPurpose>,
    next_request: u32,
    next_timer: u32,
    effects: VecDeque<Effect>,
}

impl ConsoleCore {
    /// Create a widget for the page at `page_url` (`window.location.href`).
    pub fn new(page_url: &str, config: WidgetConfig) -> Result<Self> {
        Ok(Self::with_endpoints(Endpoints::from_page_url(page_url)?, config))
    }

    #[must_use]
    pub fn with_endpoints(endpoints: Endpoints, config: WidgetConfig) -> Self {
        Self {
            config,
            endpoints,
            log: ConsoleLog::new(),
            status: StatusIndicator::new(),
            input: String::new(),
            modal_open: false,
            socket: SocketState::Connecting,
            awaiting_confirm: None,
            pending: BTreeMap::new(),
            timers: BTreeMap::new(),
            next_request: 0,
            next_timer: 0,
            effects: VecDeque::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────

    #[must_use]
    pub const fn config(&self) -> &WidgetConfig {
        &self.config
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub const fn log(&self) -> &ConsoleLog {
        &self.log
    }

    #[must_use]
    pub const fn status(&self) -> &StatusIndicator {
        &self.status
    }

    /// Last value reported for `command-line`.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub const fn is_modal_open(&self) -> bool {
        self.modal_open
    }

    #[must_use]
    pub const fn socket_state(&self) -> SocketState {
        self.socket
    }

    /// Number of submissions still waiting for an outcome.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Number of timers the host still owes a firing for.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drain all queued effects in order.
    pub fn drain_effects(&mut self) -> impl Iterator<Item = Effect> + '_ {
        self.effects.drain(..)
    }

    // ── UI events ─────────────────────────────────────────────────────

    /// Dispatch a click on the element with the given DOM id.
    ///
    /// Returns `false` if the id is not a clickable control.
    pub fn click_element(&mut self, id: &str) -> bool {
        match ElementId::from_id(id).and_then(ElementId::control) {
            Some(control) => {
                self.click(control);
                true
            }
            None => false,
        }
    }

    pub fn click(&mut self, control: Control) {
        match control {
            Control::Fixed(command) => {
                self.submit(command);
            }
            Control::HardReset => {
                self.awaiting_confirm = Some(PendingConfirm::HardReset);
                self.effects.push_back(Effect::Confirm {
                    prompt: HARD_RESET_PROMPT,
                });
            }
            Control::OpenModal => {
                self.modal_open = true;
                self.effects.push_back(Effect::ShowModal);
                self.effects.push_back(Effect::FocusInput);
            }
            Control::CloseModal => {
                self.modal_open = false;
                self.effects.push_back(Effect::HideModal);
            }
            Control::Submit => self.submit_typed(),
            Control::ClearConsole => self.clear_log(),
        }
    }

    /// Mirror the current `command-line` value. Hosts call this on every
    /// input edit and before dispatching `submit`/Enter.
    pub fn input_changed(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Handle a key released in `command-line`.
    ///
    /// Returns `true` when the key was consumed (the host should prevent the
    /// default action).
    pub fn key_up(&mut self, key: &str) -> bool {
        if key != "Enter" {
            return false;
        }
        self.submit_typed();
        true
    }

    /// Submit whatever is typed in `command-line`.
    pub fn submit_typed(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.submit(&text);

        if text == CLEAR_COMMAND {
            self.start_timer(TimerPurpose::ClearIfUntouched, self.config.clear_delay());
        }

        self.effects.push_back(Effect::SetInput(String::new()));
        self.effects.push_back(Effect::FocusInput);
    }

    /// Answer the most recent confirmation prompt.
    pub fn confirm_resolved(&mut self, accepted: bool) {
        let Some(pending) = self.awaiting_confirm.take() else {
            warn!("confirmation answered with no prompt outstanding");
            return;
        };
        match pending {
            PendingConfirm::HardReset if accepted => {
                self.status.flash(HARD_RESET_ISSUING_STATUS);
                self.effects
                    .push_back(Effect::FlashStatus(HARD_RESET_ISSUING_STATUS.to_string()));
                let completion = match self.config.hard_reset_mode {
                    HardResetMode::Blind => None,
                    HardResetMode::AwaitReload => Some(Completion::ReloadAfterHardReset),
                };
                self.submit_with(HARD_RESET_COMMAND, completion);
            }
            PendingConfirm::HardReset => debug!("hard reset declined"),
        }
    }

    // ── Submission ────────────────────────────────────────────────────

    /// Echo and post `command` with no completion.
    pub fn submit(&mut self, command: &str) -> Option<RequestId> {
        self.submit_with(command, None)
    }

    /// Echo and post `command`. Blank commands are ignored.
    pub fn submit_with(
        &mut self,
        command: &str,
        completion: Option<Completion>,
    ) -> Option<RequestId> {
        if command.trim().is_empty() {
            return None;
        }

        let request = RequestId(self.next_request);
        self.next_request = self.next_request.wrapping_add(1);
        let _span = debug_span!("console.submit", request = request.get(), command).entered();

        self.echo(command);
        self.pending.insert(
            request,
            PendingSubmission {
                command: command.to_string(),
                completion,
            },
        );
        self.effects.push_back(Effect::Post {
            request,
            url: self.endpoints.command_url.clone(),
            body: command.to_string(),
        });
        debug!(in_flight = self.pending.len(), "command posted");
        Some(request)
    }

    /// Report the response body of a finished request.
    pub fn resolve_body(&mut self, request: RequestId, body: &str) {
        self.finish(request, parse_reply(body));
    }

    /// Report that a request failed before producing a body.
    pub fn resolve_transport_error(&mut self, request: RequestId, detail: impl Into<String>) {
        self.finish(request, Err(SubmissionFailure::Transport(detail.into())));
    }

    fn finish(
        &mut self,
        request: RequestId,
        result: std::result::Result<SubmissionOutcome, SubmissionFailure>,
    ) {
        let Some(submission) = self.pending.remove(&request) else {
            warn!(request = request.get(), "outcome for unknown request");
            return;
        };
        let _span = debug_span!(
            "console.outcome",
            request = request.get(),
            command = submission.command.as_str()
        )
        .entered();

        let completion_status = match result {
            Ok(outcome @ SubmissionOutcome::Accepted) => {
                self.flash(outcome.status_text());
                CompletionStatus::Success
            }
            Ok(outcome @ SubmissionOutcome::Rejected { .. }) => {
                debug!(status = %outcome.status_text(), "command rejected");
                self.flash(outcome.status_text());
                return;
            }
            Err(failure) => {
                debug!(%failure, "command failed");
                self.flash(failure.status_text());
                CompletionStatus::Fail
            }
        };

        if let Some(completion) = submission.completion {
            self.complete(completion, completion_status);
        }
    }

    fn complete(&mut self, completion: Completion, status: CompletionStatus) {
        match (completion, status) {
            (Completion::ReloadAfterHardReset, CompletionStatus::Success) => {
                let seconds = self.config.reload_delay_ms.div_ceil(1000);
                self.flash(format!(
                    "Hard reset issued. Reloading in {seconds} seconds ..."
                ));
                self.start_timer(TimerPurpose::Reload, self.config.reload_delay());
            }
            (Completion::ReloadAfterHardReset, CompletionStatus::Fail) => {
                self.flash(HARD_RESET_FAILED_STATUS);
            }
        }
    }

    // ── Timers ────────────────────────────────────────────────────────

    pub fn timer_fired(&mut self, timer: TimerId) {
        let Some(purpose) = self.timers.remove(&timer) else {
            warn!(timer = timer.get(), "unknown timer fired");
            return;
        };
        match purpose {
            TimerPurpose::ClearIfUntouched => {
                // The field is reset to empty on submit; anything else means
                // the user started typing a new command.
                if self.input.is_empty() || self.input == CLEAR_COMMAND {
                    self.clear_log();
                } else {
                    debug!(input = %self.input, "clear skipped, input changed");
                }
            }
            TimerPurpose::Reload => self.effects.push_back(Effect::Reload),
        }
    }

    fn start_timer(&mut self, purpose: TimerPurpose, delay: Duration) {
        let timer = TimerId(self.next_timer);
        self.next_timer = self.next_timer.wrapping_add(1);
        self.timers.insert(timer, purpose);
        self.effects.push_back(Effect::StartTimer { timer, delay });
    }

    // ── Socket ────────────────────────────────────────────────────────

    pub fn socket_opened(&mut self) {
        self.socket = SocketState::Open;
    }

    /// A pushed console line; displayed verbatim.
    pub fn socket_message(&mut self, text: &str) {
        self.echo(text);
    }

    pub fn socket_closed(&mut self) {
        if self.socket == SocketState::Closed {
            return;
        }
        self.socket = SocketState::Closed;
        if self.config.announce_close {
            self.echo(SOCKET_CLOSED_NOTICE);
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────

    fn echo(&mut self, text: &str) {
        self.log.append(text);
        self.effects.push_back(Effect::AppendLine(text.to_string()));
    }

    fn clear_log(&mut self) {
        self.log.clear();
        self.effects.push_back(Effect::ClearLog);
    }

    fn flash(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.status.flash(text.clone());
        self.effects.push_back(Effect::FlashStatus(text));
    }
}
