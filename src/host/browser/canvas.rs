use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, WebGlRenderingContext};

use super::BrowserHost;
use crate::error::HostError;
use crate::host::{Canvas2d, CanvasHost, DrawOp, GpuStrings, GraphicsHost, WebGlFailure};

/// `WEBGL_debug_renderer_info` parameters
const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

/// Detached canvas plus its 2D context.
pub struct BrowserCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

fn canvas_err(e: JsValue) -> HostError {
    HostError::from_js("canvas", e)
}

impl Canvas2d for BrowserCanvas {
    fn draw(&self, op: &DrawOp<'_>) -> Result<(), HostError> {
        match *op {
            DrawOp::TextBaseline(baseline) => self.ctx.set_text_baseline(baseline),
            DrawOp::Font(font) => self.ctx.set_font(font),
            DrawOp::FillStyle(style) => self.ctx.set_fill_style_str(style),
            DrawOp::FillRect {
                x,
                y,
                width,
                height,
            } => self.ctx.fill_rect(x, y, width, height),
            DrawOp::FillText { text, x, y } => {
                self.ctx.fill_text(text, x, y).map_err(canvas_err)?
            }
        }
        Ok(())
    }

    fn to_data_url(&self) -> Result<String, HostError> {
        self.canvas.to_data_url().map_err(canvas_err)
    }

    fn text_width(&self, font: &str, text: &str) -> Result<f64, HostError> {
        self.ctx.set_font(font);
        Ok(self.ctx.measure_text(text).map_err(canvas_err)?.width())
    }
}

impl BrowserHost {
    fn canvas_element(&self, width: u32, height: u32) -> Result<HtmlCanvasElement, HostError> {
        let canvas: HtmlCanvasElement = self
            .document()?
            .create_element("canvas")
            .map_err(canvas_err)?
            .dyn_into()
            .map_err(|_| HostError::Unsupported("HTMLCanvasElement".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        Ok(canvas)
    }
}

impl CanvasHost for BrowserHost {
    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas2d>, HostError> {
        let canvas = self.canvas_element(width, height)?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(canvas_err)?
            .ok_or_else(|| HostError::Unsupported("2d context".into()))?
            .dyn_into()
            .map_err(|_| HostError::Unsupported("2d context".into()))?;
        Ok(Box::new(BrowserCanvas { canvas, ctx }))
    }
}

impl GraphicsHost for BrowserHost {
    fn unmasked_gpu(&self) -> Result<GpuStrings, WebGlFailure> {
        let canvas = self
            .canvas_element(1, 1)
            .map_err(|_| WebGlFailure::NotSupported)?;

        let gl: WebGlRenderingContext = match canvas.get_context("webgl") {
            Ok(Some(ctx)) => ctx.dyn_into().map_err(|_| WebGlFailure::ContextRefused)?,
            _ => return Err(WebGlFailure::ContextRefused),
        };

        match gl.get_extension("WEBGL_debug_renderer_info") {
            Ok(Some(_)) => {}
            _ => return Err(WebGlFailure::ExtensionBlocked),
        }

        let read = |param: u32| {
            gl.get_parameter(param)
                .ok()
                .and_then(|v| v.as_string())
                .ok_or(WebGlFailure::ExtensionBlocked)
        };
        Ok(GpuStrings {
            vendor: read(UNMASKED_VENDOR_WEBGL)?,
            renderer: read(UNMASKED_RENDERER_WEBGL)?,
        })
    }
}
