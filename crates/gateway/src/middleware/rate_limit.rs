//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use licensecore_common::{config::RateLimitConfig, errors::AppError, metrics::METRICS_PREFIX};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, reported back in 429 bodies
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

impl RateLimit {
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, AppError> {
        Ok(Self {
            limiter: create_rate_limiter(config.requests_per_second, config.burst)?,
            requests_per_second: config.requests_per_second,
        })
    }
}

/// Create a new rate limiter
pub fn create_rate_limiter(
    requests_per_second: u32,
    burst: u32,
) -> Result<Arc<GlobalRateLimiter>, AppError> {
    let non_zero = |value: u32, name: &str| {
        NonZeroU32::new(value).ok_or_else(|| AppError::Configuration {
            message: format!("rate_limit.{} must be greater than zero", name),
        })
    };

    let quota = Quota::per_second(non_zero(requests_per_second, "requests_per_second")?)
        .allow_burst(non_zero(burst, "burst")?);

    Ok(Arc::new(RateLimiter::direct(quota)))
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(rate_limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match rate_limit.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            metrics::counter!(format!("{}_rate_limited_total", METRICS_PREFIX)).increment(1);
            Err(AppError::RateLimited {
                limit: rate_limit.requests_per_second,
            })
        }
    }
}
