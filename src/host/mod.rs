//! Host ports
//!
//! Collectors never touch `web-sys` directly. Every browser surface they read
//! is behind one of the traits below; [`BrowserHost`] implements all of them
//! against the live page, and tests plug in in-memory hosts.
//!
//! ```text
//! Collector ──> port trait ──> BrowserHost (web-sys / js-sys)
//!                         └──> test host (fixed data)
//! ```

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use std::time::Duration;

use crate::error::HostError;

pub mod browser;

pub use browser::BrowserHost;

/// Browser features the collectors depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SessionStorage,
    PersistentStorage,
    Cookies,
    Permissions,
    Canvas2d,
    WebGl,
    PeerConnection,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SessionStorage => "sessionStorage",
            Capability::PersistentStorage => "localStorage",
            Capability::Cookies => "document.cookie",
            Capability::Permissions => "navigator.permissions",
            Capability::Canvas2d => "CanvasRenderingContext2D",
            Capability::WebGl => "WebGLRenderingContext",
            Capability::PeerConnection => "RTCPeerConnection",
        }
    }
}

/// Feature detection.
pub trait CapabilityHost {
    /// Whether the capability exists. May fail if the check itself throws.
    fn supports(&self, capability: Capability) -> Result<bool, HostError>;
}

/// The two web storage scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// sessionStorage
    Session,
    /// localStorage
    Persistent,
}

pub trait StorageHost {
    /// The raw `document.cookie` string.
    fn cookie_string(&self) -> Result<String, HostError>;

    /// All key/value pairs of one storage scope.
    fn storage_entries(&self, scope: StorageScope) -> Result<Vec<(String, String)>, HostError>;
}

/// Individually-readable navigator, screen and locale facts.
/// Each getter is independent; `None` means the runtime did not expose it.
pub trait NavigatorHost {
    fn user_agent(&self) -> Option<String>;
    fn language(&self) -> Option<String>;
    fn platform(&self) -> Option<String>;
    /// (width, height) in CSS pixels
    fn screen_size(&self) -> Option<(u32, u32)>;
    fn color_depth(&self) -> Option<u32>;
    /// Resolved IANA zone name
    fn timezone(&self) -> Option<String>;
    fn hardware_concurrency(&self) -> Option<u32>;
    /// Approximate memory in GiB (`navigator.deviceMemory`)
    fn device_memory(&self) -> Option<f64>;
    fn do_not_track(&self) -> Option<String>;
    fn plugins(&self) -> Vec<String>;
}

/// One 2D drawing instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp<'a> {
    TextBaseline(&'a str),
    Font(&'a str),
    FillStyle(&'a str),
    FillRect { x: f64, y: f64, width: f64, height: f64 },
    FillText { text: &'a str, x: f64, y: f64 },
}

/// An offscreen 2D surface.
pub trait Canvas2d {
    fn draw(&self, op: &DrawOp<'_>) -> Result<(), HostError>;

    /// PNG data URL of the current pixels.
    fn to_data_url(&self) -> Result<String, HostError>;

    /// Rendered width of `text` with the given CSS font shorthand.
    fn text_width(&self, font: &str, text: &str) -> Result<f64, HostError>;
}

pub trait CanvasHost {
    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas2d>, HostError>;
}

/// Unmasked vendor/renderer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuStrings {
    pub vendor: String,
    pub renderer: String,
}

/// Where WebGL identification stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebGlFailure {
    /// No WebGL constructor in this runtime
    NotSupported,
    /// `getContext("webgl")` returned null or threw
    ContextRefused,
    /// Debug renderer-info extension missing or parameters unreadable
    ExtensionBlocked,
}

pub trait GraphicsHost {
    fn unmasked_gpu(&self) -> Result<GpuStrings, WebGlFailure>;
}

#[async_trait(?Send)]
pub trait PermissionHost {
    /// Resolve `navigator.permissions.query({ name })` to its state string.
    async fn query_permission(&self, name: &str) -> Result<String, HostError>;
}

/// A live peer-connection negotiation.
///
/// Yields raw ICE candidate lines; the stream ends when the host reports
/// end-of-candidates. Dropping the session runs its release hook exactly
/// once, which closes the underlying connection.
pub struct PeerSession {
    candidates: LocalBoxStream<'static, String>,
    release: Option<Box<dyn FnOnce()>>,
}

impl PeerSession {
    pub fn new(candidates: LocalBoxStream<'static, String>, release: Box<dyn FnOnce()>) -> Self {
        Self {
            candidates,
            release: Some(release),
        }
    }

    pub fn candidates(&mut self) -> &mut LocalBoxStream<'static, String> {
        &mut self.candidates
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait PeerHost {
    /// Start gathering candidates against one STUN server.
    fn open_peer_session(&self, stun_server: &str) -> Result<PeerSession, HostError>;
}

/// Whole milliseconds of `duration`, saturating at `u32::MAX`.
pub(crate) fn millis_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Cooperative sleep.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Everything a full audit needs from its environment.
pub trait Host:
    CapabilityHost + StorageHost + NavigatorHost + CanvasHost + GraphicsHost + PermissionHost + PeerHost + Timer
{
}

impl<T> Host for T where
    T: CapabilityHost
        + StorageHost
        + NavigatorHost
        + CanvasHost
        + GraphicsHost
        + PermissionHost
        + PeerHost
        + Timer
{
}
