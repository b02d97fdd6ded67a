/// Per-client-IP rate limiting with `governor` keyed limiters.
///
/// Info and download routes each carry their own per-minute limit, counted
/// per route. Every other limited route shares the default per-minute and
/// per-hour limits.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::ApiError;

/// Which limit a route is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Default,
    Info,
    Download,
}

pub struct RateLimits {
    default_minute: DefaultKeyedRateLimiter<IpAddr>,
    default_hour: DefaultKeyedRateLimiter<IpAddr>,
    info: DefaultKeyedRateLimiter<(String, IpAddr)>,
    download: DefaultKeyedRateLimiter<(String, IpAddr)>,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_minute: RateLimiter::keyed(Quota::per_minute(config.rate_limit_per_minute)),
            default_hour: RateLimiter::keyed(Quota::per_hour(config.rate_limit_per_hour)),
            info: RateLimiter::keyed(Quota::per_minute(config.info_rate_limit_per_minute)),
            download: RateLimiter::keyed(Quota::per_minute(config.download_rate_limit_per_minute)),
        }
    }

    /// Count one request; `false` when the client is over its limit.
    pub fn check(&self, scope: Scope, route: &str, ip: IpAddr) -> bool {
        match scope {
            Scope::Default => {
                self.default_minute.check_key(&ip).is_ok() && self.default_hour.check_key(&ip).is_ok()
            }
            Scope::Info => self.info.check_key(&(route.to_string(), ip)).is_ok(),
            Scope::Download => self.download.check_key(&(route.to_string(), ip)).is_ok(),
        }
    }

    /// Drop keys whose limits have fully replenished.
    pub fn prune(&self) -> usize {
        self.default_minute.retain_recent();
        self.default_hour.retain_recent();
        self.info.retain_recent();
        self.download.retain_recent();
        self.default_minute.shrink_to_fit();
        self.default_hour.shrink_to_fit();
        self.info.shrink_to_fit();
        self.download.shrink_to_fit();
        self.default_minute.len() + self.default_hour.len() + self.info.len() + self.download.len()
    }
}

/// Middleware state: the shared limiters plus the scope of the routes it wraps.
#[derive(Clone)]
pub struct ScopedLimit {
    pub limits: Arc<RateLimits>,
    pub scope: Scope,
}

impl ScopedLimit {
    pub fn new(limits: Arc<RateLimits>, scope: Scope) -> Self {
        Self { limits, scope }
    }
}

/// Reject the request with 429 when the client is over the scope's limit.
pub async fn enforce(State(limit): State<ScopedLimit>, request: Request, next: Next) -> Response {
    let ip = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0),
    );
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if !limit.limits.check(limit.scope, &route, ip) {
        warn!("Rate limit exceeded for {} on {} ({:?})", ip, route, limit.scope);
        return ApiError::RateLimited.into_response();
    }

    debug!("{} {} from {}", request.method(), route, ip);
    next.run(request).await
}

/// Client address: the last `X-Forwarded-For` hop (the one our proxy
/// appended), else the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .last();

    forwarded
        .or_else(|| peer.map(|p| p.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
