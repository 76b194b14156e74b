//! Browser runtime: DOM timers and listeners, fetch, LocalStorage

use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlCanvasElement, PointerEvent, Request, RequestInit, RequestMode, Response, Window};

use super::{HandleKind, Host, HostEvent, HostHandle, KeyValueStorage};
use crate::error::StoreError;
use crate::scores::{HttpResponse, Transport};

/// Receives every fired handle
pub type Dispatch = Rc<dyn Fn(HostHandle, HostEvent)>;

fn js_error(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

// === Host ===

/// A live DOM registration. The closure must outlive the browser's reference to it.
enum Registration {
    Frame(i32, Closure<dyn FnMut(f64)>),
    Interval(i32, Closure<dyn FnMut()>),
    Timeout(i32, Closure<dyn FnMut()>),
    Pointer(Closure<dyn FnMut(PointerEvent)>),
}

/// [`Host`] backed by `requestAnimationFrame`, `setInterval`, `setTimeout`
/// and a `pointerdown` listener on the canvas.
///
/// Closures are never dropped while they might be executing: released and
/// fired registrations move to `retired` and are freed by [`Self::collect`]
/// at the start of the next dispatch.
pub struct BrowserHost {
    window: Window,
    canvas: HtmlCanvasElement,
    dispatch: Dispatch,
    next_id: u32,
    live: HashMap<u32, Registration>,
    retired: Vec<Registration>,
}

impl BrowserHost {
    pub fn new(window: Window, canvas: HtmlCanvasElement, dispatch: Dispatch) -> Self {
        Self {
            window,
            canvas,
            dispatch,
            next_id: 1,
            live: HashMap::new(),
            retired: Vec::new(),
        }
    }

    /// Milliseconds from the page's monotonic clock
    pub fn now_ms(&self) -> f64 {
        self.window
            .performance()
            .map_or_else(js_sys::Date::now, |p| p.now())
    }

    /// Free closures retired by earlier dispatches
    pub fn collect(&mut self) {
        self.retired.clear();
    }

    /// A one-shot handle fired; its registration is spent
    pub fn fired(&mut self, handle: HostHandle) {
        if matches!(handle.kind, HandleKind::Frame | HandleKind::Timeout)
            && let Some(registration) = self.live.remove(&handle.id)
        {
            self.retired.push(registration);
        }
    }

    fn next_handle(&mut self, kind: HandleKind) -> HostHandle {
        let handle = HostHandle {
            id: self.next_id,
            kind,
        };
        self.next_id += 1;
        handle
    }

    fn callback(&self, handle: HostHandle, event: HostEvent) -> Closure<dyn FnMut()> {
        let dispatch = self.dispatch.clone();
        Closure::new(move || dispatch(handle, event))
    }
}

impl Host for BrowserHost {
    fn request_frame(&mut self) -> HostHandle {
        let handle = self.next_handle(HandleKind::Frame);
        let dispatch = self.dispatch.clone();
        let closure = Closure::<dyn FnMut(f64)>::new(move |_time: f64| dispatch(handle, HostEvent::Frame));
        match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(id) => {
                self.live.insert(handle.id, Registration::Frame(id, closure));
            }
            Err(err) => log::error!("requestAnimationFrame failed: {}", js_error(err)),
        }
        handle
    }

    fn start_interval(&mut self, period_ms: u32) -> HostHandle {
        let handle = self.next_handle(HandleKind::Interval);
        let closure = self.callback(handle, HostEvent::Interval);
        match self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                period_ms as i32,
            ) {
            Ok(id) => {
                self.live.insert(handle.id, Registration::Interval(id, closure));
            }
            Err(err) => log::error!("setInterval failed: {}", js_error(err)),
        }
        handle
    }

    fn start_timeout(&mut self, delay_ms: u32) -> HostHandle {
        let handle = self.next_handle(HandleKind::Timeout);
        let closure = self.callback(handle, HostEvent::Timeout);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                delay_ms as i32,
            ) {
            Ok(id) => {
                self.live.insert(handle.id, Registration::Timeout(id, closure));
            }
            Err(err) => log::error!("setTimeout failed: {}", js_error(err)),
        }
        handle
    }

    fn listen_pointer(&mut self) -> HostHandle {
        let handle = self.next_handle(HandleKind::Pointer);
        let dispatch = self.dispatch.clone();
        let canvas = self.canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
            let rect = canvas.get_bounding_client_rect();
            let x = (event.client_x() as f64 - rect.left()) as f32;
            let y = (event.client_y() as f64 - rect.top()) as f32;
            dispatch(handle, HostEvent::Pointer { x, y });
        });
        match self
            .canvas
            .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref())
        {
            Ok(()) => {
                self.live.insert(handle.id, Registration::Pointer(closure));
            }
            Err(err) => log::error!("addEventListener failed: {}", js_error(err)),
        }
        handle
    }

    fn release(&mut self, handle: HostHandle) {
        let Some(registration) = self.live.remove(&handle.id) else {
            return;
        };
        match &registration {
            Registration::Frame(id, _) => {
                let _ = self.window.cancel_animation_frame(*id);
            }
            Registration::Interval(id, _) => self.window.clear_interval_with_handle(*id),
            Registration::Timeout(id, _) => self.window.clear_timeout_with_handle(*id),
            Registration::Pointer(closure) => {
                let _ = self
                    .canvas
                    .remove_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            }
        }
        self.retired.push(registration);
    }
}

// === Storage ===

/// `window.localStorage`
pub struct LocalStorage(web_sys::Storage);

impl LocalStorage {
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok().flatten();
        if storage.is_none() {
            log::warn!("LocalStorage unavailable");
        }
        storage.map(Self)
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0
            .set_item(key, value)
            .map_err(|err| StoreError::Storage(js_error(err)))
    }
}

// === Transport ===

/// `fetch` against the score server
pub struct FetchTransport {
    base_url: String,
}

impl FetchTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, method: &str, path: &str, body: Option<&str>) -> Result<HttpResponse, StoreError> {
        let transport_err = |err: JsValue| StoreError::Transport(js_error(err));

        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);
        if let Some(body) = body {
            opts.set_body(&JsValue::from_str(body));
        }

        let url = format!("{}{}", self.base_url, path);
        let request = Request::new_with_str_and_init(&url, &opts).map_err(transport_err)?;
        if body.is_some() {
            request
                .headers()
                .set("Content-Type", "application/json")
                .map_err(transport_err)?;
        }

        let window = web_sys::window().ok_or_else(|| StoreError::Transport("no window".into()))?;
        let value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(transport_err)?;
        let response: Response = value.dyn_into().map_err(transport_err)?;
        let text = JsFuture::from(response.text().map_err(transport_err)?)
            .await
            .map_err(transport_err)?;

        log::debug!("{method} {path} -> {}", response.status());
        Ok(HttpResponse {
            status: response.status(),
            body: text.as_string().unwrap_or_default(),
        })
    }
}

impl Transport for FetchTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, StoreError> {
        self.send("GET", path, None).await
    }

    async fn post_json(&self, path: &str, body: &str) -> Result<HttpResponse, StoreError> {
        self.send("POST", path, Some(body)).await
    }
}
