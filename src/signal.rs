//! Signal model
//!
//! A [`Signal`] is one status-tagged observation about the runtime. The
//! category is derived from the payload variant, so a signal can never carry
//! a tag that disagrees with its data. Degraded collection is expressed with
//! [`CollectionStatus`] plus an empty payload instead of sentinel strings;
//! the sentinels only appear in `Display` output.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Placeholder shown for any sub-field the runtime did not expose.
pub const UNKNOWN: &str = "Unknown";

/// Signal categories, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Storage,
    Identity,
    Rendering,
    Network,
    Permissions,
    Fonts,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Storage,
        Category::Identity,
        Category::Rendering,
        Category::Network,
        Category::Permissions,
        Category::Fonts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Storage => "storage",
            Category::Identity => "identity",
            Category::Rendering => "rendering",
            Category::Network => "network",
            Category::Permissions => "permissions",
            Category::Fonts => "fonts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a collector finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionStatus {
    /// Data was read normally
    Collected,
    /// The runtime lacks the capability
    Unavailable,
    /// The capability exists but refused access
    Denied,
    /// A bounded wait elapsed first; payload holds partial data
    TimedOut,
}

impl CollectionStatus {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, CollectionStatus::Collected)
    }
}

// ===== Storage =====

/// Cookies plus both web storage scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    /// Raw `name=value` cookie entries in document order
    pub cookies: Vec<String>,
    /// localStorage
    pub persistent: BTreeMap<String, String>,
    /// sessionStorage
    pub session: BTreeMap<String, String>,
}

// ===== Identity =====

/// Device and browser descriptors. `None` renders as [`UNKNOWN`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub platform: Option<String>,
    /// `WxH`
    pub screen_resolution: Option<String>,
    /// IANA zone name
    pub timezone: Option<String>,
    pub color_depth: Option<u32>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<String>,
    pub do_not_track: Option<String>,
    pub plugins: Vec<String>,
}

impl IdentityProfile {
    /// True when no sub-field resolved at all.
    pub fn is_empty(&self) -> bool {
        *self == IdentityProfile::default()
    }

    /// Label/value rows in display order, with defaults applied.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        fn or_unknown(v: &Option<String>) -> String {
            v.clone().unwrap_or_else(|| UNKNOWN.to_string())
        }

        vec![
            ("browser", or_unknown(&self.browser)),
            ("browserVersion", or_unknown(&self.browser_version)),
            ("os", or_unknown(&self.os)),
            ("userAgent", or_unknown(&self.user_agent)),
            ("language", or_unknown(&self.language)),
            ("platform", or_unknown(&self.platform)),
            ("screenResolution", or_unknown(&self.screen_resolution)),
            ("timezone", or_unknown(&self.timezone)),
            (
                "colorDepth",
                self.color_depth
                    .map(|d| format!("{}-bit", d))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "hardwareConcurrency",
                self.hardware_concurrency
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "deviceMemory",
                format!("{} GB", or_unknown(&self.device_memory_gb)),
            ),
            (
                "plugins",
                if self.plugins.is_empty() {
                    "None".to_string()
                } else {
                    self.plugins.join(", ")
                },
            ),
            (
                "doNotTrack",
                self.do_not_track
                    .clone()
                    .unwrap_or_else(|| "Not set".to_string()),
            ),
        ]
    }
}

// ===== Rendering =====

/// Canvas scene encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CanvasFingerprint {
    Rendered {
        /// Fixed-length prefix of the data URL
        prefix: String,
        /// SHA-256 of the full data URL
        digest: String,
    },
    Unavailable,
}

impl fmt::Display for CanvasFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasFingerprint::Rendered { prefix, .. } => write!(f, "{}...", prefix),
            CanvasFingerprint::Unavailable => f.write_str("Unable to generate"),
        }
    }
}

/// Unmasked GPU identification, or why it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum GpuFingerprint {
    Exposed { vendor: String, renderer: String },
    NotSupported,
    Disabled,
    Inaccessible,
}

impl GpuFingerprint {
    /// Whether a concrete driver string leaked.
    pub fn is_exposed(&self) -> bool {
        matches!(self, GpuFingerprint::Exposed { renderer, .. } if !renderer.trim().is_empty())
    }
}

impl fmt::Display for GpuFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuFingerprint::Exposed { vendor, renderer } => write!(f, "{} ({})", renderer, vendor),
            GpuFingerprint::NotSupported => f.write_str("WebGL not supported"),
            GpuFingerprint::Disabled => f.write_str("WebGL disabled"),
            GpuFingerprint::Inaccessible => f.write_str("Unable to access WebGL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingProfile {
    pub canvas: CanvasFingerprint,
    pub gpu: GpuFingerprint,
}

impl Default for RenderingProfile {
    fn default() -> Self {
        Self {
            canvas: CanvasFingerprint::Unavailable,
            gpu: GpuFingerprint::NotSupported,
        }
    }
}

// ===== Network =====

/// Unique IPv4 addresses seen during one discovery window.
///
/// Broadcast-pattern addresses (first segment `255`) are never admitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalAddressSet(BTreeSet<String>);

impl LocalAddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an address. Returns false for broadcast addresses and repeats.
    pub fn insert(&mut self, address: &str) -> bool {
        if address.split('.').next() == Some("255") {
            return false;
        }
        self.0.insert(address.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ===== Permissions =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl PermissionState {
    /// Parse a `PermissionStatus.state` string.
    pub fn parse(state: &str) -> Self {
        match state {
            "granted" => PermissionState::Granted,
            "denied" => PermissionState::Denied,
            "prompt" => PermissionState::Prompt,
            _ => PermissionState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
            PermissionState::Unknown => UNKNOWN,
        }
    }
}

/// Capability name → grant state, in query order.
///
/// Serializes as an object whose keys keep query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMap(Vec<(String, PermissionState)>);

impl Serialize for PermissionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for PermissionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = PermissionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of permission name to state")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = PermissionMap::new();
                while let Some((name, state)) = access.next_entry::<String, PermissionState>()? {
                    map.set(&name, state);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a state, replacing an earlier entry with the same name.
    pub fn set(&mut self, name: &str, state: PermissionState) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = state,
            None => self.0.push((name.to_string(), state)),
        }
    }

    pub fn get(&self, name: &str) -> Option<PermissionState> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn granted_count(&self) -> usize {
        self.0
            .iter()
            .filter(|(_, s)| *s == PermissionState::Granted)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PermissionState)> {
        self.0.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ===== Fonts =====

/// Detected font names, duplicate-free, in test-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontSet(Vec<String>);

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str) {
        if !self.0.iter().any(|f| f == name) {
            self.0.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for FontSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FontSet::new();
        for name in iter {
            set.push(name.as_ref());
        }
        set
    }
}

// ===== Signal =====

/// Per-category payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "category", content = "data")]
pub enum SignalValue {
    Storage(StorageSnapshot),
    Identity(IdentityProfile),
    Rendering(RenderingProfile),
    Network(LocalAddressSet),
    Permissions(PermissionMap),
    Fonts(FontSet),
}

impl SignalValue {
    /// The empty payload a degraded collector reports.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Storage => SignalValue::Storage(StorageSnapshot::default()),
            Category::Identity => SignalValue::Identity(IdentityProfile::default()),
            Category::Rendering => SignalValue::Rendering(RenderingProfile::default()),
            Category::Network => SignalValue::Network(LocalAddressSet::default()),
            Category::Permissions => SignalValue::Permissions(PermissionMap::default()),
            Category::Fonts => SignalValue::Fonts(FontSet::default()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            SignalValue::Storage(_) => Category::Storage,
            SignalValue::Identity(_) => Category::Identity,
            SignalValue::Rendering(_) => Category::Rendering,
            SignalValue::Network(_) => Category::Network,
            SignalValue::Permissions(_) => Category::Permissions,
            SignalValue::Fonts(_) => Category::Fonts,
        }
    }
}

/// One categorized, status-tagged observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub status: CollectionStatus,
    pub value: SignalValue,
}

impl Signal {
    pub fn new(status: CollectionStatus, value: SignalValue) -> Self {
        Self { status, value }
    }

    pub fn collected(value: SignalValue) -> Self {
        Self::new(CollectionStatus::Collected, value)
    }

    /// Empty payload with a degraded status.
    pub fn degraded(category: Category, status: CollectionStatus) -> Self {
        Self::new(status, SignalValue::empty(category))
    }

    pub fn category(&self) -> Category {
        self.value.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_addresses_rejected() {
        let mut set = LocalAddressSet::new();
        assert!(set.insert("192.168.1.20"));
        assert!(!set.insert("192.168.1.20"));
        assert!(!set.insert("255.255.255.255"));
        assert!(!set.insert("255.0.0.1"));
        // Only the first segment matters
        assert!(set.insert("10.0.0.255"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_payload_matches_category() {
        for category in Category::ALL {
            let signal = Signal::degraded(category, CollectionStatus::Unavailable);
            assert_eq!(signal.category(), category);
            assert!(signal.status.is_degraded());
        }
    }

    #[test]
    fn test_sentinel_display() {
        assert_eq!(CanvasFingerprint::Unavailable.to_string(), "Unable to generate");
        assert_eq!(GpuFingerprint::NotSupported.to_string(), "WebGL not supported");
        assert_eq!(GpuFingerprint::Disabled.to_string(), "WebGL disabled");
        assert_eq!(GpuFingerprint::Inaccessible.to_string(), "Unable to access WebGL");

        let gpu = GpuFingerprint::Exposed {
            vendor: "NVIDIA Corporation".into(),
            renderer: "GeForce GTX 1080".into(),
        };
        assert_eq!(gpu.to_string(), "GeForce GTX 1080 (NVIDIA Corporation)");
        assert!(gpu.is_exposed());
        assert!(!GpuFingerprint::Disabled.is_exposed());
    }

    #[test]
    fn test_identity_rows_default_to_unknown() {
        let rows = IdentityProfile::default().display_rows();
        let get = |k: &str| rows.iter().find(|(l, _)| *l == k).map(|(_, v)| v.clone());

        assert_eq!(get("browser").as_deref(), Some(UNKNOWN));
        assert_eq!(get("colorDepth").as_deref(), Some(UNKNOWN));
        assert_eq!(get("deviceMemory").as_deref(), Some("Unknown GB"));
        assert_eq!(get("plugins").as_deref(), Some("None"));
        assert_eq!(get("doNotTrack").as_deref(), Some("Not set"));
    }

    #[test]
    fn test_permission_map_keeps_order() {
        let mut map = PermissionMap::new();
        map.set("geolocation", PermissionState::Granted);
        map.set("camera", PermissionState::Denied);
        map.set("geolocation", PermissionState::Prompt);

        let names: Vec<_> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["geolocation", "camera"]);
        assert_eq!(map.get("geolocation"), Some(PermissionState::Prompt));
        assert_eq!(map.granted_count(), 0);
    }

    #[test]
    fn test_permission_map_serializes_as_ordered_object() {
        let mut map = PermissionMap::new();
        map.set("notifications", PermissionState::Prompt);
        map.set("camera", PermissionState::Unknown);
        map.set("geolocation", PermissionState::Granted);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"notifications":"prompt","camera":"Unknown","geolocation":"granted"}"#
        );

        let back: PermissionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_font_set_dedup() {
        let fonts: FontSet = ["Arial", "Verdana", "Arial"].into_iter().collect();
        assert_eq!(fonts.names(), &["Arial".to_string(), "Verdana".to_string()]);
    }

    #[test]
    fn test_permission_state_parse() {
        assert_eq!(PermissionState::parse("granted"), PermissionState::Granted);
        assert_eq!(PermissionState::parse("prompt"), PermissionState::Prompt);
        assert_eq!(PermissionState::parse("weird"), PermissionState::Unknown);
        assert_eq!(PermissionState::Unknown.as_str(), "Unknown");
    }
}
