//! Risk aggregation
//!
//! Turns a [`SignalSet`] into a bounded 0-100 score with a per-factor
//! breakdown. Pure: the same signals always produce the same score, and no
//! factor can lower the score, so adding a cookie, a font or a granted
//! permission never makes the result smaller.
//!
//! Factors are evaluated in a fixed order and every factor appears in the
//! breakdown, including those that contributed nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::report::SignalSet;
use crate::signal::Category;

/// Weights applied by [`aggregate`].
///
/// All weights are unsigned, so a custom policy can redistribute points but
/// never subtract them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub points_per_cookie: u32,
    pub cookie_cap: u32,
    pub persistent_storage: u32,
    pub session_storage: u32,
    /// No category cap
    pub per_granted_permission: u32,
    pub gpu_exposed: u32,
    pub points_per_font: u32,
    pub font_cap: u32,
    pub local_address: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            points_per_cookie: 5,
            cookie_cap: 20,
            persistent_storage: 15,
            session_storage: 10,
            per_granted_permission: 15,
            gpu_exposed: 15,
            points_per_font: 3,
            font_cap: 20,
            local_address: 20,
        }
    }
}

/// One scored factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskFactor {
    Cookies,
    PersistentStorage,
    SessionStorage,
    GrantedPermissions,
    GpuExposed,
    Fonts,
    LocalAddress,
}

impl RiskFactor {
    /// Evaluation and breakdown order.
    pub const ALL: [RiskFactor; 7] = [
        RiskFactor::Cookies,
        RiskFactor::PersistentStorage,
        RiskFactor::SessionStorage,
        RiskFactor::GrantedPermissions,
        RiskFactor::GpuExposed,
        RiskFactor::Fonts,
        RiskFactor::LocalAddress,
    ];

    pub fn category(&self) -> Category {
        match self {
            RiskFactor::Cookies | RiskFactor::PersistentStorage | RiskFactor::SessionStorage => {
                Category::Storage
            }
            RiskFactor::GrantedPermissions => Category::Permissions,
            RiskFactor::GpuExposed => Category::Rendering,
            RiskFactor::Fonts => Category::Fonts,
            RiskFactor::LocalAddress => Category::Network,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub factor: RiskFactor,
    pub category: Category,
    pub points: u32,
}

/// Coarse band for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Severe,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => RiskLevel::Low,
            25..=49 => RiskLevel::Moderate,
            50..=74 => RiskLevel::High,
            _ => RiskLevel::Severe,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Severe => "Severe",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    /// Always within 0..=100
    pub score: u8,
    pub level: RiskLevel,
    pub contributions: Vec<Contribution>,
}

impl RiskScore {
    /// Raw sum of contributions before clamping.
    pub fn raw_total(&self) -> u64 {
        self.contributions.iter().map(|c| c.points as u64).sum()
    }
}

fn capped(count: usize, each: u32, cap: u32) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    count.saturating_mul(each).min(cap)
}

impl RiskPolicy {
    fn points(&self, factor: RiskFactor, signals: &SignalSet) -> u32 {
        match factor {
            RiskFactor::Cookies => signals
                .storage()
                .map(|s| capped(s.cookies.len(), self.points_per_cookie, self.cookie_cap))
                .unwrap_or(0),
            RiskFactor::PersistentStorage => match signals.storage() {
                Some(s) if !s.persistent.is_empty() => self.persistent_storage,
                _ => 0,
            },
            RiskFactor::SessionStorage => match signals.storage() {
                Some(s) if !s.session.is_empty() => self.session_storage,
                _ => 0,
            },
            RiskFactor::GrantedPermissions => signals
                .permissions()
                .map(|p| {
                    let granted = u32::try_from(p.granted_count()).unwrap_or(u32::MAX);
                    granted.saturating_mul(self.per_granted_permission)
                })
                .unwrap_or(0),
            RiskFactor::GpuExposed => match signals.rendering() {
                Some(r) if r.gpu.is_exposed() => self.gpu_exposed,
                _ => 0,
            },
            RiskFactor::Fonts => signals
                .fonts()
                .map(|f| capped(f.len(), self.points_per_font, self.font_cap))
                .unwrap_or(0),
            RiskFactor::LocalAddress => match signals.network() {
                Some(n) if !n.is_empty() => self.local_address,
                _ => 0,
            },
        }
    }

    /// Score `signals` under this policy.
    pub fn aggregate(&self, signals: &SignalSet) -> RiskScore {
        let contributions: Vec<Contribution> = RiskFactor::ALL
            .iter()
            .map(|factor| Contribution {
                factor: *factor,
                category: factor.category(),
                points: self.points(*factor, signals),
            })
            .collect();

        let total: u64 = contributions.iter().map(|c| c.points as u64).sum();
        let score = total.min(100) as u8;

        RiskScore {
            score,
            level: RiskLevel::from_score(score),
            contributions,
        }
    }
}

/// Score `signals` with the default weights.
pub fn aggregate(signals: &SignalSet) -> RiskScore {
    RiskPolicy::default().aggregate(signals)
}
