use js_sys::{Array, Object, Reflect};
use wasm_bindgen::JsValue;

use super::{number_prop, string_prop, BrowserHost};
use crate::host::NavigatorHost;

impl NavigatorHost for BrowserHost {
    fn user_agent(&self) -> Option<String> {
        self.navigator()?.user_agent().ok()
    }

    fn language(&self) -> Option<String> {
        self.navigator()?.language()
    }

    fn platform(&self) -> Option<String> {
        self.navigator()?.platform().ok()
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        let screen = self.window().ok()?.screen().ok()?;
        let width = screen.width().ok()?;
        let height = screen.height().ok()?;
        Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
    }

    fn color_depth(&self) -> Option<u32> {
        let screen = self.window().ok()?.screen().ok()?;
        u32::try_from(screen.color_depth().ok()?).ok()
    }

    fn timezone(&self) -> Option<String> {
        let format = js_sys::Intl::DateTimeFormat::new(&Array::new(), &Object::new());
        string_prop(&format.resolved_options(), "timeZone")
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        let n = self.navigator()?.hardware_concurrency();
        (n.is_finite() && n >= 1.0).then(|| n as u32)
    }

    fn device_memory(&self) -> Option<f64> {
        // Chromium-only, no typed binding
        number_prop(self.navigator()?.as_ref(), "deviceMemory")
    }

    fn do_not_track(&self) -> Option<String> {
        string_prop(self.navigator()?.as_ref(), "doNotTrack")
    }

    fn plugins(&self) -> Vec<String> {
        let navigator = match self.navigator() {
            Some(n) => n,
            None => return Vec::new(),
        };
        let plugins = match Reflect::get(navigator.as_ref(), &JsValue::from_str("plugins")) {
            Ok(p) if p.is_object() => p,
            _ => return Vec::new(),
        };

        let len = number_prop(&plugins, "length").unwrap_or(0.0) as u32;
        (0..len)
            .filter_map(|i| Reflect::get_u32(&plugins, i).ok())
            .filter_map(|plugin| string_prop(&plugin, "name"))
            .filter(|name| !name.is_empty())
            .collect()
    }
}
