//! Live browser host
//!
//! Implements every host port against the current page with `web-sys` and,
//! where typed bindings are missing or vary between engines, `js_sys::Reflect`.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use js_sys::Reflect;
use std::time::Duration;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Navigator, Window};

use super::{millis_u32, Capability, CapabilityHost, Timer};
use crate::error::HostError;

mod canvas;
mod navigator;
mod peer;
mod permissions;
mod storage;

pub use canvas::BrowserCanvas;

/// The page the audit runs in.
#[derive(Debug, Clone, Default)]
pub struct BrowserHost {
    window: Option<Window>,
}

impl BrowserHost {
    pub fn new() -> Self {
        Self {
            window: web_sys::window(),
        }
    }

    pub(crate) fn window(&self) -> Result<&Window, HostError> {
        self.window
            .as_ref()
            .ok_or_else(|| HostError::Unsupported("window".into()))
    }

    pub(crate) fn document(&self) -> Result<Document, HostError> {
        self.window()?
            .document()
            .ok_or_else(|| HostError::Unsupported("document".into()))
    }

    pub(crate) fn navigator(&self) -> Option<Navigator> {
        self.window.as_ref().map(Window::navigator)
    }

    /// Whether `name` is defined on `target`. Never reads the property, so
    /// getters that throw on access are not triggered.
    fn has(target: &JsValue, name: &str) -> Result<bool, HostError> {
        Reflect::has(target, &JsValue::from_str(name)).map_err(|e| HostError::from_js(name, e))
    }
}

impl CapabilityHost for BrowserHost {
    fn supports(&self, capability: Capability) -> Result<bool, HostError> {
        let window = match self.window.as_ref() {
            Some(w) => w,
            None => return Ok(false),
        };
        let global: &JsValue = window.as_ref();

        match capability {
            Capability::SessionStorage => Self::has(global, "sessionStorage"),
            Capability::PersistentStorage => Self::has(global, "localStorage"),
            Capability::Cookies => Ok(self
                .document()
                .map(|d| d.dyn_into::<web_sys::HtmlDocument>().is_ok())
                .unwrap_or(false)),
            Capability::Permissions => Self::has(window.navigator().as_ref(), "permissions"),
            Capability::Canvas2d => {
                Ok(self.document().is_ok() && Self::has(global, "CanvasRenderingContext2D")?)
            }
            Capability::WebGl => Self::has(global, "WebGLRenderingContext"),
            Capability::PeerConnection => Self::has(global, "RTCPeerConnection"),
        }
    }
}

impl Timer for BrowserHost {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        gloo_timers::future::TimeoutFuture::new(millis_u32(duration)).boxed_local()
    }
}

/// Read a string property, treating `null`/`undefined`/non-strings as absent.
pub(crate) fn string_prop(target: &JsValue, name: &str) -> Option<String> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.as_string())
}

/// Read a numeric property.
pub(crate) fn number_prop(target: &JsValue, name: &str) -> Option<f64> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.as_f64())
}
