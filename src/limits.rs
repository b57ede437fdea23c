use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::{
    AppState,
    error::{AppError, AppResult},
};

/// Per-ip budget for public form submissions.
#[derive(Clone)]
pub struct SubmissionLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl SubmissionLimiter {
    pub fn per_minute(submissions: u32) -> Self {
        let submissions = NonZeroU32::new(submissions).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(Quota::per_minute(submissions))
    }

    fn with_quota(quota: Quota) -> Self {
        Self { limiter: Arc::new(RateLimiter::keyed(quota)) }
    }

    /// Drops ips whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_ips(&self) -> usize {
        self.limiter.len()
    }

    /// Prunes every `period` for the life of the process.
    pub fn spawn_pruner(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let before = limiter.tracked_ips();
                limiter.prune();
                tracing::debug!(before, after = limiter.tracked_ips(), "pruned submission limiter");
            }
        })
    }

    pub fn check(&self, ip: &ClientIp) -> AppResult<()> {
        self.limiter.check_key(&ip.0).map_err(|_| {
            tracing::warn!(ip = %ip.0, "submission rate limit hit");
            AppError::TooManyRequests
        })
    }
}

/// Client address. Behind a trusted proxy: first `X-Forwarded-For` hop, then `X-Real-IP`.
/// Otherwise, and as the fallback, the socket peer.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientIp(pub String);

impl ClientIp {
    fn from_parts(parts: &Parts, trust_proxy: bool) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };
        let proxied = trust_proxy
            .then(|| header("x-forwarded-for").or_else(|| header("x-real-ip")))
            .flatten();
        let peer = || parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0.ip());

        let ip = proxied.or_else(peer);
        ClientIp(ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string()))
    }
}

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, state.config.trust_proxy))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn extract(req: Request<()>, trust_proxy: bool) -> ClientIp {
        let (parts, _) = req.into_parts();
        ClientIp::from_parts(&parts, trust_proxy)
    }

    fn proxied_request() -> Request<()> {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.4")
            .body(())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo("192.0.2.7:5555".parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn trusted_proxy_headers_win() {
        assert_eq!(extract(proxied_request(), true), ClientIp("203.0.113.9".to_string()));

        let req = Request::builder().header("x-real-ip", "198.51.100.4").body(()).unwrap();
        assert_eq!(extract(req, true), ClientIp("198.51.100.4".to_string()));
    }

    #[test]
    fn untrusted_headers_are_ignored() {
        assert_eq!(extract(proxied_request(), false), ClientIp("192.0.2.7".to_string()));

        let req = Request::builder().header("x-forwarded-for", "203.0.113.9").body(()).unwrap();
        assert_eq!(extract(req, false), ClientIp("unknown".to_string()));
    }

    #[test]
    fn prune_forgets_replenished_ips() {
        let quota = Quota::with_period(Duration::from_millis(1)).unwrap();
        let limiter = SubmissionLimiter::with_quota(quota);
        for i in 0..50 {
            limiter.check(&ClientIp(format!("198.51.100.{i}"))).unwrap();
        }
        assert_eq!(limiter.tracked_ips(), 50);

        std::thread::sleep(Duration::from_millis(20));
        limiter.prune();
        assert_eq!(limiter.tracked_ips(), 0);
    }

    #[test]
    fn limiter_blocks_after_quota() {
        let limiter = SubmissionLimiter::per_minute(2);
        let ip = ClientIp("192.0.2.1".to_string());
        assert!(limiter.check(&ip).is_ok());
        assert!(limiter.check(&ip).is_ok());
        assert!(matches!(limiter.check(&ip), Err(AppError::TooManyRequests)));
        assert!(limiter.check(&ClientIp("192.0.2.2".to_string())).is_ok());
    }

    #[tokio::test]
    async fn background_pruner_empties_the_map() {
        let quota = Quota::with_period(Duration::from_millis(1)).unwrap();
        let limiter = SubmissionLimiter::with_quota(quota);
        limiter.check(&ClientIp("198.51.100.1".to_string())).unwrap();

        let pruner = limiter.spawn_pruner(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        pruner.abort();

        assert_eq!(limiter.tracked_ips(), 0);
    }
}
