//! Font detection collector
//!
//! A font is considered installed when text set in `"<font>, <baseline>"`
//! measures differently from the same text in the baseline family alone:
//! if the browser had to fall back, the widths match.

use async_trait::async_trait;
use std::rc::Rc;

use super::Collector;
use crate::host::{Canvas2d, CanvasHost, Capability, CapabilityHost};
use crate::probe::probe;
use crate::signal::{Category, CollectionStatus, FontSet, Signal, SignalValue};

/// Wide and narrow glyphs so small metric differences add up.
pub const TEST_STRING: &str = "mmmmmmmmmmlli";
pub const TEST_SIZE: &str = "72px";

/// Generic families compared against, in order.
pub const BASELINE_FAMILIES: [&str; 3] = ["monospace", "sans-serif", "serif"];

pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "Arial",
    "Arial Black",
    "Calibri",
    "Cambria",
    "Comic Sans MS",
    "Consolas",
    "Courier New",
    "Georgia",
    "Helvetica",
    "Helvetica Neue",
    "Impact",
    "Lucida Console",
    "Menlo",
    "Monaco",
    "Palatino",
    "Segoe UI",
    "Tahoma",
    "Times New Roman",
    "Trebuchet MS",
    "Ubuntu",
    "Verdana",
    "Roboto",
    "Noto Sans",
    "DejaVu Sans",
];

/// Measure every candidate against the baselines on `canvas`.
///
/// Never fails: baselines that cannot be measured are skipped, and a
/// candidate whose measurement fails is treated as matching the baseline.
pub fn detect_fonts(canvas: &dyn Canvas2d, candidates: &[String]) -> FontSet {
    let baselines: Vec<(&str, f64)> = BASELINE_FAMILIES
        .iter()
        .filter_map(|family| {
            match canvas.text_width(&format!("{} {}", TEST_SIZE, family), TEST_STRING) {
                Ok(width) => Some((*family, width)),
                Err(e) => {
                    log::debug!("fonts: baseline {} unmeasurable ({})", family, e);
                    None
                }
            }
        })
        .collect();

    let mut detected = FontSet::new();
    if baselines.is_empty() {
        return detected;
    }

    for candidate in candidates {
        let installed = baselines.iter().any(|(family, base_width)| {
            let font = format!("{} '{}', {}", TEST_SIZE, candidate, family);
            canvas
                .text_width(&font, TEST_STRING)
                .map(|width| (width - base_width).abs() > f64::EPSILON)
                .unwrap_or(false)
        });
        if installed {
            detected.push(candidate);
        }
    }

    detected
}

pub struct FontCollector<H> {
    host: Rc<H>,
    candidates: Vec<String>,
}

impl<H: CanvasHost + CapabilityHost> FontCollector<H> {
    pub fn new(host: Rc<H>, candidates: Vec<String>) -> Self {
        Self { host, candidates }
    }
}

#[async_trait(?Send)]
impl<H: CanvasHost + CapabilityHost> Collector for FontCollector<H> {
    fn category(&self) -> Category {
        Category::Fonts
    }

    async fn collect(&self) -> Signal {
        if !probe(self.host.as_ref(), Capability::Canvas2d).is_available() {
            return Signal::degraded(Category::Fonts, CollectionStatus::Unavailable);
        }
        let canvas = match self.host.create_canvas(1, 1) {
            Ok(canvas) => canvas,
            Err(e) => {
                log::debug!("fonts: no measurement context ({})", e);
                return Signal::degraded(Category::Fonts, CollectionStatus::Unavailable);
            }
        };

        let fonts = detect_fonts(canvas.as_ref(), &self.candidates);
        log::debug!(
            "fonts: {} of {} candidates detected",
            fonts.len(),
            self.candidates.len()
        );
        Signal::collected(SignalValue::Fonts(fonts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::DrawOp;
    use futures::executor::block_on;

    /// Measures 100.0 for generic families and for the installed fonts'
    /// names, otherwise falls back to the baseline width.
    struct MetricsCanvas {
        installed: Vec<&'static str>,
        broken_baselines: Vec<&'static str>,
        broken_fonts: Vec<&'static str>,
    }

    impl Canvas2d for MetricsCanvas {
        fn draw(&self, _op: &DrawOp<'_>) -> Result<(), HostError> {
            Ok(())
        }

        fn to_data_url(&self) -> Result<String, HostError> {
            Ok(String::new())
        }

        fn text_width(&self, font: &str, _text: &str) -> Result<f64, HostError> {
            let family = font.trim_start_matches("72px ");
            if self.broken_baselines.contains(&family) {
                return Err(HostError::Failed("measureText".into()));
            }
            if self.broken_fonts.iter().any(|f| family.contains(f)) {
                return Err(HostError::Failed("measureText".into()));
            }
            if self
                .installed
                .iter()
                .any(|f| family.starts_with(&format!("'{}'", f)))
            {
                return Ok(117.5);
            }
            Ok(100.0)
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_only_differing_fonts() {
        let canvas = MetricsCanvas {
            installed: vec!["Arial", "Verdana"],
            broken_baselines: vec![],
            broken_fonts: vec![],
        };
        let fonts = detect_fonts(&canvas, &names(&["Arial", "Papyrus", "Verdana", "Arial"]));
        assert_eq!(fonts.names(), &names(&["Arial", "Verdana"])[..]);
    }

    #[test]
    fn test_failed_measurements_never_raise() {
        let canvas = MetricsCanvas {
            installed: vec!["Arial", "Verdana"],
            broken_baselines: vec!["monospace"],
            broken_fonts: vec!["Verdana"],
        };
        let fonts = detect_fonts(&canvas, &names(&["Arial", "Verdana"]));
        assert_eq!(fonts.names(), &names(&["Arial"])[..]);
    }

    #[test]
    fn test_no_baselines_detects_nothing() {
        let canvas = MetricsCanvas {
            installed: vec!["Arial"],
            broken_baselines: BASELINE_FAMILIES.to_vec(),
            broken_fonts: vec![],
        };
        assert!(detect_fonts(&canvas, &names(&["Arial"])).is_empty());
    }

    struct NoCanvas;

    impl CapabilityHost for NoCanvas {
        fn supports(&self, _capability: Capability) -> Result<bool, HostError> {
            Ok(false)
        }
    }

    impl CanvasHost for NoCanvas {
        fn create_canvas(&self, _w: u32, _h: u32) -> Result<Box<dyn Canvas2d>, HostError> {
            Err(HostError::Unsupported("canvas".into()))
        }
    }

    #[test]
    fn test_missing_context_is_unavailable() {
        let collector = FontCollector::new(Rc::new(NoCanvas), names(DEFAULT_FONT_CANDIDATES));
        let signal = block_on(collector.collect());
        assert_eq!(signal.status, CollectionStatus::Unavailable);
        assert_eq!(signal.value, SignalValue::Fonts(FontSet::new()));
    }
}
