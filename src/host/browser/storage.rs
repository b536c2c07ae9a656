use wasm_bindgen::JsCast;
use web_sys::HtmlDocument;

use super::BrowserHost;
use crate::error::HostError;
use crate::host::{StorageHost, StorageScope};

impl StorageHost for BrowserHost {
    fn cookie_string(&self) -> Result<String, HostError> {
        let document: HtmlDocument = self
            .document()?
            .dyn_into()
            .map_err(|_| HostError::Unsupported("document.cookie".into()))?;
        document
            .cookie()
            .map_err(|e| HostError::from_js("document.cookie", e))
    }

    fn storage_entries(&self, scope: StorageScope) -> Result<Vec<(String, String)>, HostError> {
        let window = self.window()?;
        let (name, storage) = match scope {
            StorageScope::Session => ("sessionStorage", window.session_storage()),
            StorageScope::Persistent => ("localStorage", window.local_storage()),
        };
        let storage = storage
            .map_err(|e| HostError::from_js(name, e))?
            .ok_or_else(|| HostError::Unsupported(name.into()))?;

        let len = storage.length().map_err(|e| HostError::from_js(name, e))?;
        let mut entries = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Ok(Some(key)) = storage.key(i) {
                let value = storage.get_item(&key).ok().flatten().unwrap_or_default();
                entries.push((key, value));
            }
        }
        Ok(entries)
    }
}
