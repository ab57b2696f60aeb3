use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{extract_bearer_token, AuthError, AuthService, RateLimitConfig, UserRole, UserSession};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

fn require_role(request: &Request, allowed: &[UserRole]) -> Result<(), AuthError> {
    let session = request
        .extensions()
        .get::<UserSession>()
        .ok_or(AuthError::InsufficientPermissions)?;

    if !allowed.contains(&session.role) {
        tracing::debug!(user_id = %session.user_id, role = session.role.as_str(), "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(())
}

pub async fn admin_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, &[UserRole::Admin])?;
    Ok(next.run(request).await)
}

pub async fn personal_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, &[UserRole::Personal])?;
    Ok(next.run(request).await)
}

pub async fn student_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, &[UserRole::Student])?;
    Ok(next.run(request).await)
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn security_headers_layer() -> tower_http::set_header::SetResponseHeaderLayer<axum::http::HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::overriding(
        axum::http::header::HeaderName::from_static("x-content-type-options"),
        axum::http::HeaderValue::from_static("nosniff"),
    )
}

/// Sliding-window request limiter keyed by client address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_seconds))
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let window = self.window;

        // Forget clients whose whole history has aged out
        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < window);
            !times.is_empty()
        });

        let entry = requests.entry(key.to_string()).or_default();
        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .or_else(|| request.headers().get("x-real-ip"))
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!(client = %client_ip, "rate limit exceeded");
        return Err(AuthError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(!limiter.check_rate_limit("client1"));

        assert!(limiter.check_rate_limit("client2"));
    }

    #[test]
    fn test_rate_limiter_window_expires() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.check_rate_limit("client"));
        assert!(!limiter.check_rate_limit("client"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check_rate_limit("client"));
    }

    #[test]
    fn test_rate_limiter_forgets_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));

        for client in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            assert!(limiter.check_rate_limit(client));
        }
        assert_eq!(limiter.tracked_clients(), 3);

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check_rate_limit("10.0.0.4"));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
