//! Rendering collector (canvas + WebGL)
//!
//! The canvas half draws a fixed scene and encodes the pixels. Identical
//! rendering backends and driver stacks produce identical bytes, which is
//! what makes the encoding identifying. Nothing in the scene may depend on
//! time, randomness or the page.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::rc::Rc;

use super::Collector;
use crate::error::HostError;
use crate::host::{Capability, CanvasHost, CapabilityHost, DrawOp, GraphicsHost, WebGlFailure};
use crate::probe::probe;
use crate::signal::{
    CanvasFingerprint, Category, CollectionStatus, GpuFingerprint, RenderingProfile, Signal,
    SignalValue,
};

pub const CANVAS_WIDTH: u32 = 240;
pub const CANVAS_HEIGHT: u32 = 60;

/// The fixed fingerprinting scene.
pub const CANVAS_SCENE: &[DrawOp<'static>] = &[
    DrawOp::TextBaseline("top"),
    DrawOp::Font("14px \"Arial\""),
    DrawOp::TextBaseline("alphabetic"),
    DrawOp::FillStyle("#f60"),
    DrawOp::FillRect {
        x: 125.0,
        y: 1.0,
        width: 62.0,
        height: 20.0,
    },
    DrawOp::FillStyle("#069"),
    DrawOp::FillText {
        text: "Browser fingerprint 🔒",
        x: 2.0,
        y: 15.0,
    },
];

pub struct RenderingCollector<H> {
    host: Rc<H>,
    prefix_len: usize,
}

impl<H: CanvasHost + GraphicsHost + CapabilityHost> RenderingCollector<H> {
    pub fn new(host: Rc<H>, prefix_len: usize) -> Self {
        Self { host, prefix_len }
    }

    pub fn canvas_fingerprint(&self) -> CanvasFingerprint {
        if !probe(self.host.as_ref(), Capability::Canvas2d).is_available() {
            return CanvasFingerprint::Unavailable;
        }
        match self.render_scene() {
            Ok(data_url) => CanvasFingerprint::Rendered {
                prefix: data_url.chars().take(self.prefix_len).collect(),
                digest: hex::encode(Sha256::digest(data_url.as_bytes())),
            },
            Err(e) => {
                log::debug!("rendering: canvas scene failed ({})", e);
                CanvasFingerprint::Unavailable
            }
        }
    }

    fn render_scene(&self) -> Result<String, HostError> {
        let canvas = self.host.create_canvas(CANVAS_WIDTH, CANVAS_HEIGHT)?;
        for op in CANVAS_SCENE {
            canvas.draw(op)?;
        }
        canvas.to_data_url()
    }

    pub fn gpu_fingerprint(&self) -> GpuFingerprint {
        if !probe(self.host.as_ref(), Capability::WebGl).is_available() {
            return GpuFingerprint::NotSupported;
        }
        match self.host.unmasked_gpu() {
            Ok(gpu) if !gpu.renderer.trim().is_empty() => GpuFingerprint::Exposed {
                vendor: gpu.vendor,
                renderer: gpu.renderer,
            },
            Ok(_) => GpuFingerprint::Inaccessible,
            Err(WebGlFailure::NotSupported) => GpuFingerprint::NotSupported,
            Err(WebGlFailure::ContextRefused) => GpuFingerprint::Disabled,
            Err(WebGlFailure::ExtensionBlocked) => GpuFingerprint::Inaccessible,
        }
    }
}

#[async_trait(?Send)]
impl<H: CanvasHost + GraphicsHost + CapabilityHost> Collector for RenderingCollector<H> {
    fn category(&self) -> Category {
        Category::Rendering
    }

    async fn collect(&self) -> Signal {
        let profile = RenderingProfile {
            canvas: self.canvas_fingerprint(),
            gpu: self.gpu_fingerprint(),
        };

        let canvas_ok = matches!(profile.canvas, CanvasFingerprint::Rendered { .. });
        let status = if canvas_ok || profile.gpu.is_exposed() {
            CollectionStatus::Collected
        } else if matches!(profile.gpu, GpuFingerprint::Disabled | GpuFingerprint::Inaccessible) {
            CollectionStatus::Denied
        } else {
            CollectionStatus::Unavailable
        };

        log::debug!("rendering: canvas={} gpu={}", profile.canvas, profile.gpu);
        Signal::new(status, SignalValue::Rendering(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Canvas2d, GpuStrings};
    use futures::executor::block_on;
    use std::cell::RefCell;

    /// Canvas whose "pixels" are a transcript of the draw calls.
    struct TranscriptCanvas {
        log: RefCell<Vec<String>>,
    }

    impl Canvas2d for TranscriptCanvas {
        fn draw(&self, op: &DrawOp<'_>) -> Result<(), HostError> {
            self.log.borrow_mut().push(format!("{:?}", op));
            Ok(())
        }

        fn to_data_url(&self) -> Result<String, HostError> {
            Ok(format!(
                "data:image/png;base64,{}",
                hex::encode(self.log.borrow().join("|"))
            ))
        }

        fn text_width(&self, _font: &str, text: &str) -> Result<f64, HostError> {
            Ok(text.len() as f64)
        }
    }

    struct StubGraphics {
        canvas: bool,
        webgl: bool,
        gpu: Result<GpuStrings, WebGlFailure>,
    }

    impl CapabilityHost for StubGraphics {
        fn supports(&self, capability: Capability) -> Result<bool, HostError> {
            Ok(match capability {
                Capability::Canvas2d => self.canvas,
                Capability::WebGl => self.webgl,
                _ => false,
            })
        }
    }

    impl CanvasHost for StubGraphics {
        fn create_canvas(&self, _w: u32, _h: u32) -> Result<Box<dyn Canvas2d>, HostError> {
            Ok(Box::new(TranscriptCanvas {
                log: RefCell::new(Vec::new()),
            }))
        }
    }

    impl GraphicsHost for StubGraphics {
        fn unmasked_gpu(&self) -> Result<GpuStrings, WebGlFailure> {
            self.gpu.clone()
        }
    }

    fn nvidia() -> GpuStrings {
        GpuStrings {
            vendor: "NVIDIA Corporation".into(),
            renderer: "NVIDIA GeForce RTX 3070".into(),
        }
    }

    #[test]
    fn test_canvas_is_deterministic_and_truncated() {
        let host = Rc::new(StubGraphics {
            canvas: true,
            webgl: false,
            gpu: Err(WebGlFailure::NotSupported),
        });
        let collector = RenderingCollector::new(host, 50);

        let first = collector.canvas_fingerprint();
        let second = collector.canvas_fingerprint();
        assert_eq!(first, second);

        match first {
            CanvasFingerprint::Rendered { prefix, digest } => {
                assert_eq!(prefix.chars().count(), 50);
                assert!(prefix.starts_with("data:image/png;base64,"));
                assert_eq!(digest.len(), 64);
            }
            CanvasFingerprint::Unavailable => panic!("expected a rendered canvas"),
        }
    }

    #[test]
    fn test_no_canvas_context() {
        let host = Rc::new(StubGraphics {
            canvas: false,
            webgl: false,
            gpu: Err(WebGlFailure::NotSupported),
        });
        let signal = block_on(RenderingCollector::new(host, 50).collect());
        assert_eq!(signal.status, CollectionStatus::Unavailable);
        match signal.value {
            SignalValue::Rendering(profile) => {
                assert_eq!(profile.canvas.to_string(), "Unable to generate");
                assert_eq!(profile.gpu.to_string(), "WebGL not supported");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_gpu_failure_mapping() {
        let cases = [
            (Err(WebGlFailure::ContextRefused), GpuFingerprint::Disabled),
            (Err(WebGlFailure::ExtensionBlocked), GpuFingerprint::Inaccessible),
            (
                Ok(GpuStrings {
                    vendor: "x".into(),
                    renderer: " ".into(),
                }),
                GpuFingerprint::Inaccessible,
            ),
            (
                Ok(nvidia()),
                GpuFingerprint::Exposed {
                    vendor: "NVIDIA Corporation".into(),
                    renderer: "NVIDIA GeForce RTX 3070".into(),
                },
            ),
        ];
        for (gpu, expected) in cases {
            let host = Rc::new(StubGraphics {
                canvas: false,
                webgl: true,
                gpu,
            });
            assert_eq!(RenderingCollector::new(host, 50).gpu_fingerprint(), expected);
        }
    }

    #[test]
    fn test_blocked_webgl_without_canvas_is_denied() {
        let host = Rc::new(StubGraphics {
            canvas: false,
            webgl: true,
            gpu: Err(WebGlFailure::ContextRefused),
        });
        let signal = block_on(RenderingCollector::new(host, 50).collect());
        assert_eq!(signal.status, CollectionStatus::Denied);
    }

    #[test]
    fn test_exposed_gpu_is_collected() {
        let host = Rc::new(StubGraphics {
            canvas: true,
            webgl: true,
            gpu: Ok(nvidia()),
        });
        let signal = block_on(RenderingCollector::new(host, 50).collect());
        assert_eq!(signal.status, CollectionStatus::Collected);
    }
}
