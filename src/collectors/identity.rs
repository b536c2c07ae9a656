//! Identity/fingerprint collector
//!
//! Browser family and OS are derived from the user-agent string with ordered
//! pattern tables: the first matching row wins and matching is
//! case-insensitive. Rows are ordered so that tokens embedded by other
//! browsers (every Chromium derivative also says `Chrome/`, Chrome also says
//! `Safari/`) are checked after the more specific ones.

use async_trait::async_trait;
use std::rc::Rc;

use super::Collector;
use crate::host::NavigatorHost;
use crate::signal::{Category, CollectionStatus, IdentityProfile, Signal, SignalValue};

struct BrowserPattern {
    family: &'static str,
    /// Lowercase markers; the version follows the marker
    markers: &'static [&'static str],
    /// Extra lowercase token that must also be present
    requires: Option<&'static str>,
}

const BROWSER_PATTERNS: &[BrowserPattern] = &[
    BrowserPattern {
        family: "Edge",
        markers: &["edg/", "edge/", "edga/", "edgios/"],
        requires: None,
    },
    BrowserPattern {
        family: "Opera",
        markers: &["opr/", "opera/"],
        requires: None,
    },
    BrowserPattern {
        family: "Samsung Internet",
        markers: &["samsungbrowser/"],
        requires: None,
    },
    BrowserPattern {
        family: "Firefox",
        markers: &["firefox/", "fxios/"],
        requires: None,
    },
    BrowserPattern {
        family: "Chrome",
        markers: &["chrome/", "crios/", "chromium/"],
        requires: None,
    },
    BrowserPattern {
        family: "Safari",
        markers: &["version/"],
        requires: Some("safari"),
    },
];

const OS_PATTERNS: &[(&str, &[&str])] = &[
    ("Windows", &["windows"]),
    ("iOS", &["iphone", "ipad", "ipod"]),
    ("Android", &["android"]),
    ("macOS", &["mac os x", "macintosh"]),
    ("ChromeOS", &["cros "]),
    ("Linux", &["linux"]),
];

/// Browser and OS derived from a user-agent string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
}

/// Classify a user-agent string.
pub fn parse_user_agent(user_agent: &str) -> UserAgentInfo {
    let ua = user_agent.to_lowercase();
    let mut info = UserAgentInfo::default();

    'browsers: for pattern in BROWSER_PATTERNS {
        if let Some(required) = pattern.requires {
            if !ua.contains(required) {
                continue;
            }
        }
        for marker in pattern.markers {
            if let Some(pos) = ua.find(marker) {
                info.browser = Some(pattern.family.to_string());
                info.version = leading_version(&ua[pos + marker.len()..]);
                break 'browsers;
            }
        }
    }

    info.os = OS_PATTERNS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| ua.contains(m)))
        .map(|(family, _)| family.to_string());

    info
}

/// The dotted version number at the start of `rest`, if any.
fn leading_version(rest: &str) -> Option<String> {
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// `8` for whole numbers, `0.5` otherwise.
fn format_memory(gib: f64) -> String {
    if gib.fract() == 0.0 {
        format!("{}", gib as u64)
    } else {
        format!("{}", gib)
    }
}

pub struct IdentityCollector<H> {
    host: Rc<H>,
}

impl<H: NavigatorHost> IdentityCollector<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self { host }
    }

    /// Assemble the profile; each sub-field resolves or stays empty on its own.
    pub fn profile(&self) -> IdentityProfile {
        let host = self.host.as_ref();
        let user_agent = host.user_agent().filter(|ua| !ua.is_empty());
        let parsed = user_agent
            .as_deref()
            .map(parse_user_agent)
            .unwrap_or_default();

        IdentityProfile {
            browser: parsed.browser,
            browser_version: parsed.version,
            os: parsed.os,
            user_agent,
            language: host.language(),
            platform: host.platform().filter(|p| !p.is_empty()),
            screen_resolution: host.screen_size().map(|(w, h)| format!("{}x{}", w, h)),
            timezone: host.timezone(),
            color_depth: host.color_depth(),
            hardware_concurrency: host.hardware_concurrency().filter(|n| *n > 0),
            device_memory_gb: host
                .device_memory()
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(format_memory),
            do_not_track: host.do_not_track(),
            plugins: host.plugins(),
        }
    }
}

#[async_trait(?Send)]
impl<H: NavigatorHost> Collector for IdentityCollector<H> {
    fn category(&self) -> Category {
        Category::Identity
    }

    async fn collect(&self) -> Signal {
        let profile = self.profile();
        let status = if profile.is_empty() {
            CollectionStatus::Unavailable
        } else {
            CollectionStatus::Collected
        };
        Signal::new(status, SignalValue::Identity(profile))
    }
}
