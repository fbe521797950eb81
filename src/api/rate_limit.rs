//! Per-client request quotas
//!
//! `POST /download` has its own per-minute quota; every other limited route
//! shares a per-hour quota. Clients are keyed by peer IP address, which
//! requires the router to be served with
//! `into_make_service_with_connect_info::<SocketAddr>()`. Without connect
//! info (for example under `oneshot` in tests) all requests share the
//! unspecified address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use super::error::ApiError;
use crate::config::RateLimitConfig;

/// Which quota a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Download,
    Default,
}

impl RouteClass {
    pub fn of(method: &Method, path: &str) -> Self {
        if method == Method::POST && path == "/download" {
            RouteClass::Download
        } else {
            RouteClass::Default
        }
    }
}

pub struct RateLimits {
    download: DefaultKeyedRateLimiter<IpAddr>,
    default: DefaultKeyedRateLimiter<IpAddr>,
}

impl RateLimits {
    /// `None` when rate limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        // Zero quotas are refused by config validation
        let per_minute = NonZeroU32::new(config.download_per_minute).unwrap_or(NonZeroU32::MIN);
        let per_hour = NonZeroU32::new(config.default_per_hour).unwrap_or(NonZeroU32::MIN);

        Some(Self {
            download: RateLimiter::keyed(Quota::per_minute(per_minute)),
            default: RateLimiter::keyed(Quota::per_hour(per_hour)),
        })
    }

    /// Charge one request to `client`; false when the quota is exhausted
    pub fn check(&self, class: RouteClass, client: IpAddr) -> bool {
        let limiter = match class {
            RouteClass::Download => &self.download,
            RouteClass::Default => &self.default,
        };
        limiter.check_key(&client).is_ok()
    }

    /// Forget clients whose quota has fully replenished
    pub fn prune(&self) {
        self.download.retain_recent();
        self.default.retain_recent();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.download.len() + self.default.len()
    }
}

pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware for `axum::middleware::from_fn_with_state`
pub async fn enforce(
    State(limits): State<Arc<RateLimits>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let class = RouteClass::of(request.method(), request.uri().path());
    let client = client_ip(&request);

    if !limits.check(class, client) {
        warn!(%client, route = %request.uri().path(), "Rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(download_per_minute: u32, default_per_hour: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            download_per_minute,
            default_per_hour,
        }
    }

    #[test]
    fn test_disabled_yields_none() {
        let disabled = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(RateLimits::from_config(&disabled).is_none());
    }

    #[test]
    fn test_route_class() {
        assert_eq!(RouteClass::of(&Method::POST, "/download"), RouteClass::Download);
        assert_eq!(RouteClass::of(&Method::GET, "/download"), RouteClass::Default);
        assert_eq!(RouteClass::of(&Method::GET, "/bat"), RouteClass::Default);
    }

    #[test]
    fn test_quota_is_per_client() {
        let limits = RateLimits::from_config(&config(2, 20)).unwrap();
        let alice: IpAddr = "10.0.0.1".parse().unwrap();
        let bob: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limits.check(RouteClass::Download, alice));
        assert!(limits.check(RouteClass::Download, alice));
        assert!(!limits.check(RouteClass::Download, alice));

        assert!(limits.check(RouteClass::Download, bob));
    }

    #[test]
    fn test_quotas_are_independent() {
        let limits = RateLimits::from_config(&config(1, 1)).unwrap();
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limits.check(RouteClass::Download, client));
        assert!(!limits.check(RouteClass::Download, client));
        assert!(limits.check(RouteClass::Default, client));
        assert!(!limits.check(RouteClass::Default, client));
    }
}
