#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the console widget.
//!
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use js_sys::{Array, Reflect};
use terrapanel_console::{
    Control, ConsoleCore, ElementId, RequestId, TimerId, WidgetConfig,
};
use tracing::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    CloseEvent, Document, Event, HtmlElement, HtmlInputElement, KeyboardEvent, MessageEvent,
    RequestInit, Response, WebSocket, Window,
};

use crate::STATUS_FLASH_CLASS;
use crate::host::{DomHost, pump};

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

/// Render a rejected promise value the way `"" + e` would in JS.
fn js_error_text(value: JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.to_string());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn element_by_id<T: JsCast>(document: &Document, id: ElementId) -> Result<T, JsValue> {
    document
        .get_element_by_id(id.as_str())
        .ok_or_else(|| JsValue::from_str(&format!("missing element #{}", id.as_str())))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("element #{} has the wrong type", id.as_str())))
}

async fn post_command(url: String, body: String) -> Result<String, String> {
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&JsValue::from_str(&body));

    let response = JsFuture::from(window.fetch_with_str_and_init(&url, &init))
        .await
        .map_err(js_error_text)?
        .dyn_into::<Response>()
        .map_err(js_error_text)?;
    let text = JsFuture::from(response.text().map_err(js_error_text)?)
        .await
        .map_err(js_error_text)?;
    text.as_string()
        .ok_or_else(|| "response body is not text".to_string())
}

/// The page elements the widget writes to, plus a handle back to the
/// widget for asynchronous completions.
struct WebDom {
    window: Window,
    document: Document,
    status: HtmlElement,
    input: HtmlInputElement,
    console: HtmlElement,
    modal: HtmlElement,
    widget: Weak<RefCell<Shared>>,
}

impl WebDom {
    fn lookup(window: Window, document: Document) -> Result<Self, JsValue> {
        Ok(Self {
            status: element_by_id(&document, ElementId::CommandStatus)?,
            input: element_by_id(&document, ElementId::CommandLine)?,
            console: element_by_id(&document, ElementId::Console)?,
            modal: element_by_id(&document, ElementId::ConsoleModal)?,
            window,
            document,
            widget: Weak::new(),
        })
    }
}

impl DomHost for WebDom {
    fn append_line(&mut self, text: &str) {
        let line = self.document.create_text_node(text);
        let _ = self.console.append_child(&line);
        if let Ok(br) = self.document.create_element("br") {
            let _ = self.console.append_child(&br);
        }
        self.console
            .scroll_to_with_x_and_y(0.0, f64::from(self.console.scroll_height()));
    }

    fn clear_log(&mut self) {
        self.console.set_inner_html("");
    }

    fn flash_status(&mut self, text: &str) {
        self.status.set_inner_text(text);
        let classes = self.status.class_list();
        let _ = classes.remove_1(STATUS_FLASH_CLASS);
        // Reading layout forces a reflow so the animation restarts.
        let _ = self.status.offset_width();
        let _ = classes.add_1(STATUS_FLASH_CLASS);
    }

    fn set_modal_visible(&mut self, visible: bool) {
        let display = if visible { "block" } else { "none" };
        let _ = self.modal.style().set_property("display", display);
    }

    fn focus_input(&mut self) {
        let _ = self.input.focus();
    }

    fn set_input(&mut self, value: &str) {
        self.input.set_value(value);
    }

    fn post(&mut self, request: RequestId, url: &str, body: &str) {
        let widget = self.widget.clone();
        let url = url.to_string();
        let body = body.to_string();
        spawn_local(async move {
            let result = post_command(url, body).await;
            let Some(shared) = widget.upgrade() else {
                return;
            };
            dispatch(&shared, |core| match result {
                Ok(text) => core.resolve_body(request, &text),
                Err(detail) => core.resolve_transport_error(request, detail),
            });
        });
    }

    fn start_timer(&mut self, timer: TimerId, delay: Duration) {
        let widget = self.widget.clone();
        let callback = Closure::once_into_js(move || {
            if let Some(shared) = widget.upgrade() {
                dispatch(&shared, |core| core.timer_fired(timer));
            }
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        if let Err(error) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            warn!(error = %js_error_text(error), "setTimeout failed");
        }
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        self.window.confirm_with_message(prompt).unwrap_or(false)
    }

    fn reload(&mut self) {
        if let Err(error) = self.window.location().reload() {
            warn!(error = %js_error_text(error), "reload failed");
        }
    }
}

struct Shared {
    core: ConsoleCore,
    dom: WebDom,
}

/// Run `f` against the core, then apply whatever it queued.
fn dispatch(shared: &Rc<RefCell<Shared>>, f: impl FnOnce(&mut ConsoleCore)) {
    let Ok(mut guard) = shared.try_borrow_mut() else {
        warn!("re-entrant widget dispatch dropped");
        return;
    };
    let state = &mut *guard;
    f(&mut state.core);
    pump(&mut state.core, &mut state.dom);
}

type EventClosure = Closure<dyn FnMut(Event)>;

/// The mounted console widget.
///
/// Construct once the DOM is ready; the widget binds its listeners and
/// opens the console socket immediately.
#[wasm_bindgen]
pub struct ConsoleWidget {
    shared: Rc<RefCell<Shared>>,
    socket: Option<WebSocket>,
    listeners: Vec<EventClosure>,
    socket_handlers: Vec<EventClosure>,
}

#[wasm_bindgen]
impl ConsoleWidget {
    /// Mount on the current page. `config_json` is an optional
    /// `WidgetConfig` object serialized as JSON.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ConsoleWidget, JsValue> {
        install_panic_hook();

        let config = WidgetConfig::from_json(config_json.as_deref().unwrap_or_default())
            .map_err(|error| JsValue::from_str(&error.to_string()))?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let href = window.location().href()?;
        let core = ConsoleCore::new(&href, config)
            .map_err(|error| JsValue::from_str(&error.to_string()))?;
        let mut dom = WebDom::lookup(window, document)?;

        let shared = Rc::new_cyclic(|weak| {
            dom.widget = weak.clone();
            RefCell::new(Shared { core, dom })
        });

        let mut widget = Self {
            shared,
            socket: None,
            listeners: Vec::new(),
            socket_handlers: Vec::new(),
        };
        widget.bind_controls()?;
        widget.bind_input()?;
        widget.open_socket()?;
        info!("console widget mounted");
        Ok(widget)
    }

    /// Submit a command as if a button had sent it.
    pub fn submit(&self, command: &str) {
        dispatch(&self.shared, |core| {
            core.submit(command);
        });
    }

    /// Current log lines, oldest first.
    #[wasm_bindgen(js_name = logLines)]
    pub fn log_lines(&self) -> Array {
        let shared = self.shared.borrow();
        shared
            .core
            .log()
            .lines()
            .iter()
            .map(|line| JsValue::from_str(line))
            .collect()
    }

    /// Current status indicator text, if any.
    #[wasm_bindgen(js_name = statusText)]
    pub fn status_text(&self) -> Option<String> {
        self.shared.borrow().core.status().text().map(str::to_owned)
    }

    /// Close the console socket; the widget never reopens it.
    pub fn disconnect(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.close();
        }
    }
}

impl ConsoleWidget {
    fn document(&self) -> Document {
        self.shared.borrow().dom.document.clone()
    }

    fn bind_controls(&mut self) -> Result<(), JsValue> {
        let document = self.document();
        for (element, control) in Control::clickable() {
            let target: HtmlElement = element_by_id(&document, element)?;
            let weak = Rc::downgrade(&self.shared);
            let closure = EventClosure::new(move |_event: Event| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                dispatch(&shared, |core| {
                    if control == Control::Submit {
                        sync_input(core);
                    }
                    core.click(control);
                });
            });
            target.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
            self.listeners.push(closure);
        }
        Ok(())
    }

    fn bind_input(&mut self) -> Result<(), JsValue> {
        let input: HtmlInputElement = element_by_id(&self.document(), ElementId::CommandLine)?;

        let weak = Rc::downgrade(&self.shared);
        let on_input = EventClosure::new(move |_event: Event| {
            if let Some(shared) = weak.upgrade() {
                dispatch(&shared, sync_input);
            }
        });
        input.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())?;
        self.listeners.push(on_input);

        let weak = Rc::downgrade(&self.shared);
        let on_key_up = EventClosure::new(move |event: Event| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let key = key_event.key();
            dispatch(&shared, |core| {
                sync_input(core);
                if core.key_up(&key) {
                    event.prevent_default();
                }
            });
        });
        input.add_event_listener_with_callback("keyup", on_key_up.as_ref().unchecked_ref())?;
        self.listeners.push(on_key_up);
        Ok(())
    }

    fn open_socket(&mut self) -> Result<(), JsValue> {
        let url = self.shared.borrow().core.endpoints().console_url.clone();
        let socket = WebSocket::new(&url)?;
        debug!(%url, "console socket opening");

        let weak = Rc::downgrade(&self.shared);
        let on_open = EventClosure::new(move |_event: Event| {
            if let Some(shared) = weak.upgrade() {
                dispatch(&shared, ConsoleCore::socket_opened);
            }
        });
        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let weak = Rc::downgrade(&self.shared);
        let on_message = EventClosure::new(move |event: Event| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let Some(text) = event
                .dyn_ref::<MessageEvent>()
                .and_then(|message| message.data().as_string())
            else {
                debug!("non-text console frame ignored");
                return;
            };
            dispatch(&shared, |core| core.socket_message(&text));
        });
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let weak = Rc::downgrade(&self.shared);
        let on_close = EventClosure::new(move |event: Event| {
            if let Some(close) = event.dyn_ref::<CloseEvent>() {
                debug!(code = close.code(), "console socket closed");
            }
            if let Some(shared) = weak.upgrade() {
                dispatch(&shared, ConsoleCore::socket_closed);
            }
        });
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        self.socket_handlers = vec![on_open, on_message, on_close];
        self.socket = Some(socket);
        Ok(())
    }
}

impl Drop for ConsoleWidget {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.set_onopen(None);
            socket.set_onmessage(None);
            socket.set_onclose(None);
            let _ = socket.close();
        }
    }
}

/// Copy the live `command-line` value into the core.
fn sync_input(core: &mut ConsoleCore) {
    let value = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(ElementId::CommandLine.as_str()))
        .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
        .map(|input| input.value());
    if let Some(value) = value {
        core.input_changed(value);
    }
}
