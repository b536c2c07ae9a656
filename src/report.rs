//! Signal sets and the final audit report.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::risk::{RiskPolicy, RiskScore};
use crate::signal::{
    Category, CollectionStatus, FontSet, IdentityProfile, LocalAddressSet, PermissionMap,
    RenderingProfile, Signal, SignalValue, StorageSnapshot,
};

/// Exactly one signal per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SignalSet(BTreeMap<Category, Signal>);

impl SignalSet {
    /// Build from collector output. The first signal of each category wins;
    /// categories nobody reported are filled with an empty `Unavailable`
    /// signal.
    pub fn from_signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut map = BTreeMap::new();
        for signal in signals {
            map.entry(signal.category()).or_insert(signal);
        }
        for category in Category::ALL {
            map.entry(category)
                .or_insert_with(|| Signal::degraded(category, CollectionStatus::Unavailable));
        }
        SignalSet(map)
    }

    pub fn get(&self, category: Category) -> Option<&Signal> {
        self.0.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &Signal)> {
        self.0.iter().map(|(c, s)| (*c, s))
    }

    fn value(&self, category: Category) -> Option<&SignalValue> {
        self.0.get(&category).map(|s| &s.value)
    }

    pub fn storage(&self) -> Option<&StorageSnapshot> {
        match self.value(Category::Storage) {
            Some(SignalValue::Storage(s)) => Some(s),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&IdentityProfile> {
        match self.value(Category::Identity) {
            Some(SignalValue::Identity(p)) => Some(p),
            _ => None,
        }
    }

    pub fn rendering(&self) -> Option<&RenderingProfile> {
        match self.value(Category::Rendering) {
            Some(SignalValue::Rendering(r)) => Some(r),
            _ => None,
        }
    }

    pub fn network(&self) -> Option<&LocalAddressSet> {
        match self.value(Category::Network) {
            Some(SignalValue::Network(n)) => Some(n),
            _ => None,
        }
    }

    pub fn permissions(&self) -> Option<&PermissionMap> {
        match self.value(Category::Permissions) {
            Some(SignalValue::Permissions(p)) => Some(p),
            _ => None,
        }
    }

    pub fn fonts(&self) -> Option<&FontSet> {
        match self.value(Category::Fonts) {
            Some(SignalValue::Fonts(f)) => Some(f),
            _ => None,
        }
    }

    /// Categories whose collection did not finish normally.
    pub fn degraded_categories(&self) -> Vec<Category> {
        self.0
            .iter()
            .filter(|(_, s)| s.status.is_degraded())
            .map(|(c, _)| *c)
            .collect()
    }

    /// Stable digest of the identifying payloads (identity, rendering,
    /// fonts). Storage, permissions and addresses change between visits and
    /// are left out.
    pub fn fingerprint_id(&self) -> String {
        #[derive(Serialize)]
        struct Identifying<'a> {
            identity: Option<&'a IdentityProfile>,
            rendering: Option<&'a RenderingProfile>,
            fonts: Option<&'a FontSet>,
        }

        let canonical = serde_json::to_vec(&Identifying {
            identity: self.identity(),
            rendering: self.rendering(),
            fonts: self.fonts(),
        })
        .unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// Immutable outcome of one audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintReport {
    signals: SignalSet,
    risk: RiskScore,
    fingerprint_id: String,
    degraded_categories: Vec<Category>,
}

impl FingerprintReport {
    pub fn assemble(signals: SignalSet, policy: &RiskPolicy) -> Self {
        let risk = policy.aggregate(&signals);
        let fingerprint_id = signals.fingerprint_id();
        let degraded_categories = signals.degraded_categories();
        Self {
            signals,
            risk,
            fingerprint_id,
            degraded_categories,
        }
    }

    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    pub fn risk(&self) -> &RiskScore {
        &self.risk
    }

    pub fn fingerprint_id(&self) -> &str {
        &self.fingerprint_id
    }

    pub fn degraded_categories(&self) -> &[Category] {
        &self.degraded_categories
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{CanvasFingerprint, GpuFingerprint, PermissionState};

    fn fixed_signals() -> Vec<Signal> {
        let mut storage = StorageSnapshot::default();
        storage.cookies = vec!["sid=1".into(), "theme=dark".into()];
        storage.persistent.insert("token".into(), "abc".into());

        let mut permissions = PermissionMap::new();
        permissions.set("geolocation", PermissionState::Granted);
        permissions.set("camera", PermissionState::Prompt);

        vec![
            Signal::collected(SignalValue::Storage(storage)),
            Signal::collected(SignalValue::Identity(IdentityProfile {
                browser: Some("Firefox".into()),
                os: Some("Linux".into()),
                ..Default::default()
            })),
            Signal::collected(SignalValue::Rendering(RenderingProfile {
                canvas: CanvasFingerprint::Rendered {
                    prefix: "data:image/png;base64,iVBORw0KGgo".into(),
                    digest: "00".repeat(32),
                },
                gpu: GpuFingerprint::Disabled,
            })),
            Signal::collected(SignalValue::Permissions(permissions)),
            Signal::new(
                CollectionStatus::TimedOut,
                SignalValue::Network(LocalAddressSet::new()),
            ),
            Signal::collected(SignalValue::Fonts(["Arial", "Verdana"].into_iter().collect())),
        ]
    }

    #[test]
    fn test_missing_categories_filled() {
        let set = SignalSet::from_signals(vec![]);
        assert_eq!(set.iter().count(), Category::ALL.len());
        assert_eq!(set.degraded_categories(), Category::ALL.to_vec());
    }

    #[test]
    fn test_first_signal_per_category_wins() {
        let first = Signal::collected(SignalValue::Fonts(["Arial"].into_iter().collect()));
        let second = Signal::collected(SignalValue::Fonts(FontSet::new()));
        let set = SignalSet::from_signals(vec![first.clone(), second]);
        assert_eq!(set.get(Category::Fonts), Some(&first));
    }

    #[test]
    fn test_report_serialization_is_byte_identical() {
        let policy = RiskPolicy::default();
        let a = FingerprintReport::assemble(SignalSet::from_signals(fixed_signals()), &policy);
        let b = FingerprintReport::assemble(SignalSet::from_signals(fixed_signals()), &policy);

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.degraded_categories(), &[Category::Network]);
        // 2 cookies (10) + persistent (15) + one granted permission (15) + 2 fonts (6)
        assert_eq!(a.risk().score, 46);
    }

    #[test]
    fn test_fingerprint_ignores_volatile_categories() {
        let base = SignalSet::from_signals(fixed_signals());

        let mut changed = fixed_signals();
        changed[0] = Signal::collected(SignalValue::Storage(StorageSnapshot::default()));
        let changed = SignalSet::from_signals(changed);

        assert_eq!(base.fingerprint_id(), changed.fingerprint_id());
        assert_eq!(base.fingerprint_id().len(), 64);

        let mut other_fonts = fixed_signals();
        other_fonts[5] = Signal::collected(SignalValue::Fonts(["Arial"].into_iter().collect()));
        assert_ne!(
            base.fingerprint_id(),
            SignalSet::from_signals(other_fonts).fingerprint_id()
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report =
            FingerprintReport::assemble(SignalSet::from_signals(fixed_signals()), &RiskPolicy::default());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["signals"]["fonts"]["value"]["category"], "fonts");
        assert_eq!(json["signals"]["network"]["status"], "timedOut");
        assert_eq!(json["risk"]["level"], "moderate");
        assert_eq!(json["degradedCategories"][0], "network");
    }
}
