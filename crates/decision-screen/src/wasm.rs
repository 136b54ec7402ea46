//! WASM bindings for the live decision page
//!
//! The page creates one `DecisionPage` from its `js_vars`, forwards
//! `liveRecv` data to `receive`, and chart clicks to `click`. Sending goes
//! through the global `liveSend` function provided by the experiment
//! framework.

#![cfg(feature = "wasm")]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::{Rc, Weak};
use gloo_timers::callback::Timeout;
use serde::Serialize;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use crate::{
    ChartModel, ClientMessage, ControllerConfig, Page, PeriodController, PeriodUpdate, Scheduler,
    SessionParams, Timer, TimerHandle, Transport, TransportError,
};

type BrowserController = PeriodController<DomPage, LiveTransport, BrowserScheduler>;

fn console_error(context: &str, detail: &JsValue) {
    web_sys::console::error_2(&JsValue::from_str(context), detail);
}

/// Collects one formatted event and prints it to the console when dropped
struct ConsoleWriter {
    level: Level,
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buffer);
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }
        let line = JsValue::from_str(text);
        if self.level == Level::ERROR {
            web_sys::console::error_1(&line);
        } else if self.level == Level::WARN {
            web_sys::console::warn_1(&line);
        } else if self.level == Level::INFO {
            web_sys::console::info_1(&line);
        } else {
            web_sys::console::debug_1(&line);
        }
    }
}

struct Console;

impl<'a> MakeWriter<'a> for Console {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { level: Level::INFO, buffer: Vec::new() }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter { level: *meta.level(), buffer: Vec::new() }
    }
}

/// Text fields and form of the decision page; the chart is drawn by a JS callback
struct DomPage {
    document: web_sys::Document,
    chart_callback: js_sys::Function,
}

impl DomPage {
    fn set_text(&self, id: &str, text: &str) {
        match self.document.get_element_by_id(id) {
            Some(element) => element.set_text_content(Some(text)),
            None => console_error("missing page element", &JsValue::from_str(id)),
        }
    }
}

impl Page for DomPage {
    fn render_chart(&mut self, chart: &ChartModel) {
        let value = match chart.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
            Ok(value) => value,
            Err(e) => {
                console_error("chart serialization failed", &JsValue::from_str(&e.to_string()));
                return;
            }
        };
        if let Err(e) = self.chart_callback.call1(&JsValue::NULL, &value) {
            console_error("chart callback failed", &e);
        }
    }

    fn set_earnings(&mut self, previous_period: &str, cumulative: &str) {
        self.set_text("earnings_prev_period", previous_period);
        self.set_text("earnings", cumulative);
    }

    fn set_period_counter(&mut self, text: &str) {
        self.set_text("period_counter", text);
    }

    fn set_countdown(&mut self, text: &str) {
        self.set_text("countdown", text);
    }

    fn set_status(&mut self, text: &str) {
        self.set_text("gameState", text);
    }

    fn submit_form(&mut self) {
        let form = self
            .document
            .get_element_by_id("form")
            .and_then(|element| element.dyn_into::<web_sys::HtmlFormElement>().ok());
        match form {
            Some(form) => {
                if let Err(e) = form.submit() {
                    console_error("form submission failed", &e);
                }
            }
            None => console_error("missing page element", &JsValue::from_str("form")),
        }
    }
}

/// Sends through the framework's global `liveSend`, looked up on every call
/// because the framework may install it after this module loads
struct LiveTransport;

impl Transport for LiveTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        let live_send = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("liveSend"))
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
            .ok_or(TransportError::NotReady)?;
        let payload = message
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        live_send
            .call1(&JsValue::NULL, &payload)
            .map(|_| ())
            .map_err(|e| TransportError::Failed(format!("{:?}", e)))
    }
}

struct PendingTimeout {
    /// Dropping it clears the timeout and frees its callback
    _timeout: Timeout,
    fired: Rc<Cell<bool>>,
}

/// `setTimeout` timers that call back into the controller
struct BrowserScheduler {
    target: Weak<RefCell<BrowserController>>,
    pending: HashMap<u64, PendingTimeout>,
    next_handle: u64,
}

impl BrowserScheduler {
    fn new(target: Weak<RefCell<BrowserController>>) -> Self {
        Self { target, pending: HashMap::new(), next_handle: 0 }
    }

    /// Release callbacks that have already run. A callback only counts as
    /// run once it has returned, so the one currently executing stays alive.
    fn release_fired(&mut self) {
        self.pending.retain(|_, p| !p.fired.get());
    }
}

impl Scheduler for BrowserScheduler {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn schedule(&mut self, delay_ms: u64, timer: Timer) -> TimerHandle {
        self.release_fired();
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);

        let target = self.target.clone();
        let fired = Rc::new(Cell::new(false));
        let done = fired.clone();
        let delay = delay_ms.min(u32::MAX as u64) as u32;
        let timeout = Timeout::new(delay, move || {
            if let Some(controller) = target.upgrade() {
                match controller.try_borrow_mut() {
                    Ok(mut controller) => controller.on_timer(timer),
                    Err(_) => console_error("controller busy, timer dropped", &JsValue::UNDEFINED),
                };
            }
            done.set(true);
        });
        self.pending.insert(handle.0, PendingTimeout { _timeout: timeout, fired });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(&handle.0);
    }
}

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    let _ = tracing_subscriber::fmt()
        .with_writer(Console)
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .without_time()
        .try_init();
}

/// The decision screen controller, owned by the page
#[wasm_bindgen]
pub struct DecisionPage {
    inner: Rc<RefCell<BrowserController>>,
}

#[wasm_bindgen]
impl DecisionPage {
    /// # Arguments
    /// * `js_vars` - Session payload embedded by the host page
    /// * `chart_callback` - Called with the chart model on every redraw
    /// * `config_json` - Optional JSON overriding timing, retry and texts
    #[wasm_bindgen(constructor)]
    pub fn new(
        js_vars: JsValue,
        chart_callback: js_sys::Function,
        config_json: Option<String>,
    ) -> Result<DecisionPage, JsError> {
        let session: SessionParams = serde_wasm_bindgen::from_value(js_vars)
            .map_err(|e| JsError::new(&format!("Invalid js_vars: {}", e)))?;
        session
            .validate()
            .map_err(|e| JsError::new(&e.to_string()))?;
        let config = match config_json {
            Some(json) => ControllerConfig::from_json(&json).map_err(|e| JsError::new(&e.to_string()))?,
            None => ControllerConfig::default(),
        };
        let document = web_sys::window()
            .ok_or_else(|| JsError::new("No window"))?
            .document().ok_or_else(|| JsError::new("No document"))?;

        let inner = Rc::new_cyclic(|target: &Weak<RefCell<BrowserController>>| {
            let page = DomPage { document, chart_callback };
            let scheduler = BrowserScheduler::new(target.clone());
            RefCell::new(PeriodController::new(session, config, page, LiveTransport, scheduler))
        });
        Ok(DecisionPage { inner })
    }

    /// Call once the DOM has loaded
    pub fn start(&self) -> Result<(), JsError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| JsError::new("Controller busy"))?
            .start()
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// `liveRecv` handler. Never throws: bad messages are logged and dropped.
    pub fn receive(&self, data: JsValue) {
        let value: serde_json::Value = match serde_wasm_bindgen::from_value(data.clone()) {
            Ok(value) => value,
            Err(e) => {
                console_error(&format!("ignoring server message: {}", e), &data);
                return;
            }
        };
        let result = PeriodUpdate::from_value(value).and_then(|update| match self.inner.try_borrow_mut() {
            Ok(mut controller) => controller.handle_update(update),
            Err(_) => Err(crate::ControllerError::InvalidTransition {
                operation: "server message",
                phase: "busy",
            }),
        });
        if let Err(e) = result {
            console_error(&format!("ignoring server message: {}", e), &data);
        }
    }

    /// Chart click in data coordinates; returns the snapped choice if accepted
    pub fn click(&self, data_x: f64) -> Option<f64> {
        self.inner.try_borrow_mut().ok()?.on_chart_click(data_x)
    }

    /// Chart click as a canvas-relative pixel column
    pub fn click_pixel(&self, pixel_x: f64, width: f64) -> Option<f64> {
        let mut controller = self.inner.try_borrow_mut().ok()?;
        let data_x = controller.chart().x_axis.value_for_pixel(pixel_x, width);
        controller.on_chart_click(data_x)
    }

    /// `undefined` while the controller is busy, e.g. from inside the chart callback
    #[wasm_bindgen(getter)]
    pub fn pending_choice(&self) -> Option<f64> {
        self.inner.try_borrow().ok().map(|controller| controller.pending_choice())
    }

    /// Current chart model, for the page's initial chart setup. The chart
    /// callback already receives the model, so calling this from inside it fails.
    pub fn chart(&self) -> Result<JsValue, JsError> {
        self.inner
            .try_borrow()
            .map_err(|_| JsError::new("Controller busy"))?
            .chart()
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }
}
