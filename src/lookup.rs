//! Client address lookup
//!
//! Resolves the caller's public address to a coarse location and network
//! owner, behind a per-client rate limit. Upstream payloads are loosely
//! typed; every field falls back to `"Unknown"` (strings) or `0`
//! (coordinates) when missing or empty.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::error::{AuditError, Result};
use crate::rate_limiter::RequestRateLimiter;
use crate::signal::UNKNOWN;

pub const GEO_ENDPOINT: &str = "http://ip-api.com/json/";
pub const GEO_FIELDS: &str = "status,country,city,lat,lon,timezone,isp,org";
pub const WHOIS_ENDPOINT: &str = "https://www.whois.com/api/json/";

/// Request metadata the client address is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHeaders {
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub remote_address: Option<String>,
}

/// First `x-forwarded-for` hop, else `x-real-ip`, else the socket address,
/// else `"unknown"`. Empty values are skipped.
pub fn client_address(headers: &ClientHeaders) -> String {
    let forwarded = headers
        .forwarded_for
        .as_deref()
        .and_then(|list| list.split(',').next())
        .map(str::trim);

    [
        forwarded,
        headers.real_ip.as_deref(),
        headers.remote_address.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| !candidate.is_empty())
    .unwrap_or("unknown")
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub isp: String,
    pub org: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub registrar: String,
    pub registrant: String,
}

/// Body returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResponse {
    pub fn failed(ip: &str, err: &AuditError) -> Self {
        Self {
            ip: ip.to_string(),
            geolocation: None,
            whois: None,
            error: Some(err.user_message()),
        }
    }
}

fn text_or_unknown(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn number_or_zero(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Parse an ip-api style payload. Only `status == "success"` yields a record.
pub fn parse_geo(data: &Value) -> Option<GeoRecord> {
    if data.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }
    Some(GeoRecord {
        city: text_or_unknown(data, "city"),
        country: text_or_unknown(data, "country"),
        latitude: number_or_zero(data, "lat"),
        longitude: number_or_zero(data, "lon"),
        timezone: text_or_unknown(data, "timezone"),
        isp: text_or_unknown(data, "isp"),
        org: text_or_unknown(data, "org"),
    })
}

pub fn parse_whois(data: &Value) -> WhoisRecord {
    WhoisRecord {
        registrar: text_or_unknown(data, "registrar"),
        registrant: text_or_unknown(data, "registrant"),
    }
}

#[async_trait(?Send)]
pub trait LookupService {
    /// Geolocation payload; `Ok(None)` for a non-success HTTP status.
    async fn fetch_geo(&self, ip: &str) -> Result<Option<Value>>;

    /// WHOIS payload; `Ok(None)` for a non-success HTTP status.
    async fn fetch_whois(&self, ip: &str) -> Result<Option<Value>>;

    /// Resolve `ip`. A geolocation failure becomes the response's error; a
    /// WHOIS failure is dropped.
    async fn lookup(&self, ip: &str) -> LookupResponse {
        let geolocation = match self.fetch_geo(ip).await {
            Ok(data) => data.as_ref().and_then(parse_geo),
            Err(e) => {
                log::warn!("lookup: geolocation for {} failed: {}", ip, e);
                return LookupResponse::failed(ip, &e);
            }
        };

        let whois = match self.fetch_whois(ip).await {
            Ok(data) => data.as_ref().map(parse_whois),
            Err(e) => {
                log::debug!("lookup: whois for {} failed: {}", ip, e);
                None
            }
        };

        LookupResponse {
            ip: ip.to_string(),
            geolocation,
            whois,
            error: None,
        }
    }
}

/// [`LookupService`] over the browser `fetch` API.
#[derive(Debug, Clone)]
pub struct FetchLookup {
    geo_endpoint: String,
    whois_endpoint: String,
}

impl Default for FetchLookup {
    fn default() -> Self {
        Self::new(GEO_ENDPOINT, WHOIS_ENDPOINT)
    }
}

impl FetchLookup {
    pub fn new(geo_endpoint: impl Into<String>, whois_endpoint: impl Into<String>) -> Self {
        Self {
            geo_endpoint: geo_endpoint.into(),
            whois_endpoint: whois_endpoint.into(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        let upstream = |what: &str, e: wasm_bindgen::JsValue| {
            AuditError::UpstreamLookupFailed(format!("{}: {:?}", what, e))
        };

        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_mode(RequestMode::Cors);

        let request = Request::new_with_str_and_init(url, &opts)
            .map_err(|e| upstream("Request::new failed", e))?;

        let window = web_sys::window()
            .ok_or_else(|| AuditError::UpstreamLookupFailed("no window object".into()))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|e| upstream("fetch failed", e))?;
        let resp: Response = resp_value
            .dyn_into()
            .map_err(|_| AuditError::UpstreamLookupFailed("response is not a Response".into()))?;

        if !resp.ok() {
            log::debug!("lookup: {} answered HTTP {}", url, resp.status());
            return Ok(None);
        }

        let body = JsFuture::from(resp.json().map_err(|e| upstream("json failed", e))?)
            .await
            .map_err(|e| upstream("await json failed", e))?;
        let data: Value = serde_wasm_bindgen::from_value(body)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        Ok(Some(data))
    }
}

#[async_trait(?Send)]
impl LookupService for FetchLookup {
    async fn fetch_geo(&self, ip: &str) -> Result<Option<Value>> {
        let url = format!("{}{}?fields={}", self.geo_endpoint, ip, GEO_FIELDS);
        self.get_json(&url).await
    }

    async fn fetch_whois(&self, ip: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.whois_endpoint, ip);
        self.get_json(&url).await
    }
}

/// HTTP-style outcome of a gated lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupReply {
    pub status: u16,
    pub body: LookupResponse,
}

/// Rate limiter in front of a lookup service.
pub struct LookupGate<S> {
    limiter: RefCell<RequestRateLimiter>,
    service: S,
}

impl<S: LookupService> LookupGate<S> {
    pub fn new(service: S) -> Self {
        Self::with_limiter(service, RequestRateLimiter::new())
    }

    pub fn with_limiter(service: S, limiter: RequestRateLimiter) -> Self {
        Self {
            limiter: RefCell::new(limiter),
            service,
        }
    }

    pub async fn handle(&self, headers: &ClientHeaders) -> LookupReply {
        let ip = client_address(headers);

        // Borrow ends before the lookup suspends
        let admitted = self.limiter.borrow_mut().check(&ip);
        if let Err(e) = admitted {
            return LookupReply {
                status: 429,
                body: LookupResponse::failed(&ip, &e),
            };
        }

        let body = self.service.lookup(&ip).await;
        let status = if body.error.is_some() { 500 } else { 200 };
        LookupReply { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimiterConfig;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_client_address_precedence() {
        let headers = ClientHeaders {
            forwarded_for: Some(" 203.0.113.7 , 10.0.0.1".into()),
            real_ip: Some("198.51.100.2".into()),
            remote_address: Some("127.0.0.1".into()),
        };
        assert_eq!(client_address(&headers), "203.0.113.7");

        let headers = ClientHeaders {
            forwarded_for: Some(String::new()),
            real_ip: Some("198.51.100.2".into()),
            ..Default::default()
        };
        assert_eq!(client_address(&headers), "198.51.100.2");

        let headers = ClientHeaders {
            remote_address: Some("::1".into()),
            ..Default::default()
        };
        assert_eq!(client_address(&headers), "::1");
        assert_eq!(client_address(&ClientHeaders::default()), "unknown");
    }

    #[test]
    fn test_parse_geo_defaults() {
        let record = parse_geo(&json!({
            "status": "success",
            "country": "Germany",
            "city": "",
            "lat": 52.52,
            "timezone": "Europe/Berlin"
        }))
        .unwrap();

        assert_eq!(record.country, "Germany");
        assert_eq!(record.city, UNKNOWN);
        assert_eq!(record.latitude, 52.52);
        assert_eq!(record.longitude, 0.0);
        assert_eq!(record.isp, UNKNOWN);

        assert!(parse_geo(&json!({ "status": "fail", "message": "private range" })).is_none());
        assert!(parse_geo(&json!({})).is_none());
    }

    #[test]
    fn test_parse_whois_defaults() {
        let record = parse_whois(&json!({ "registrar": "RIPE NCC" }));
        assert_eq!(record.registrar, "RIPE NCC");
        assert_eq!(record.registrant, UNKNOWN);
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let body = LookupResponse::failed("203.0.113.7", &AuditError::RateLimited { retry_after_ms: 10 });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            json!({ "ip": "203.0.113.7", "error": "Rate limited. Please try again later." })
        );
    }

    struct StubService {
        geo: Result<Option<Value>>,
        whois: Result<Option<Value>>,
        calls: Cell<u32>,
    }

    impl StubService {
        fn new(geo: Result<Option<Value>>, whois: Result<Option<Value>>) -> Self {
            Self {
                geo,
                whois,
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl LookupService for StubService {
        async fn fetch_geo(&self, _ip: &str) -> Result<Option<Value>> {
            self.calls.set(self.calls.get() + 1);
            self.geo.clone()
        }

        async fn fetch_whois(&self, _ip: &str) -> Result<Option<Value>> {
            self.whois.clone()
        }
    }

    fn success_geo() -> Value {
        json!({ "status": "success", "country": "France", "city": "Paris", "lat": 48.85, "lon": 2.35 })
    }

    #[test]
    fn test_whois_failure_is_swallowed() {
        let service = StubService::new(
            Ok(Some(success_geo())),
            Err(AuditError::UpstreamLookupFailed("timeout".into())),
        );
        let response = block_on(service.lookup("203.0.113.7"));

        assert_eq!(response.error, None);
        assert_eq!(response.whois, None);
        assert_eq!(response.geolocation.map(|g| g.city), Some("Paris".to_string()));
    }

    #[test]
    fn test_geo_failure_reported() {
        let service = StubService::new(
            Err(AuditError::UpstreamLookupFailed("fetch failed".into())),
            Ok(None),
        );
        let response = block_on(service.lookup("203.0.113.7"));
        assert_eq!(response.error.as_deref(), Some("Failed to lookup IP information"));
        assert!(response.geolocation.is_none());
    }

    #[test]
    fn test_gate_rate_limits_per_client() {
        let gate = LookupGate::with_limiter(
            StubService::new(Ok(Some(success_geo())), Ok(None)),
            RequestRateLimiter::with_config(RateLimiterConfig {
                max_requests: 2,
                window_ms: 60_000,
            }),
        );
        let client = ClientHeaders {
            forwarded_for: Some("203.0.113.7".into()),
            ..Default::default()
        };

        assert_eq!(block_on(gate.handle(&client)).status, 200);
        assert_eq!(block_on(gate.handle(&client)).status, 200);

        let limited = block_on(gate.handle(&client));
        assert_eq!(limited.status, 429);
        assert_eq!(
            limited.body.error.as_deref(),
            Some("Rate limited. Please try again later.")
        );
        // Rejected requests never reach the upstream
        assert_eq!(gate.service.calls.get(), 2);
    }

    #[test]
    fn test_gate_maps_upstream_failure_to_500() {
        let gate = LookupGate::new(StubService::new(
            Err(AuditError::UpstreamLookupFailed("dns".into())),
            Ok(None),
        ));
        let reply = block_on(gate.handle(&ClientHeaders::default()));
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body.ip, "unknown");
    }
}
