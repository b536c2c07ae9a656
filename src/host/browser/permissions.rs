use async_trait::async_trait;
use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::PermissionStatus;

use super::{string_prop, BrowserHost};
use crate::error::HostError;
use crate::host::PermissionHost;

#[async_trait(?Send)]
impl PermissionHost for BrowserHost {
    async fn query_permission(&self, name: &str) -> Result<String, HostError> {
        let permissions = self
            .navigator()
            .ok_or_else(|| HostError::Unsupported("navigator".into()))?
            .permissions()
            .map_err(|e| HostError::from_js("navigator.permissions", e))?;

        let descriptor = Object::new();
        Reflect::set(&descriptor, &JsValue::from_str("name"), &JsValue::from_str(name))
            .map_err(|e| HostError::from_js(name, e))?;

        // Unknown names reject with a TypeError
        let promise = permissions
            .query(&descriptor)
            .map_err(|e| HostError::from_js(name, e))?;
        let status: PermissionStatus = JsFuture::from(promise)
            .await
            .map_err(|e| HostError::from_js(name, e))?
            .dyn_into()
            .map_err(|_| HostError::Failed(format!("{}: not a PermissionStatus", name)))?;

        string_prop(status.as_ref(), "state")
            .ok_or_else(|| HostError::Failed(format!("{}: no state", name)))
    }
}
