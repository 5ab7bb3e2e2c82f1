use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::ResponseError;
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::error::Error;

use super::RateLimiter;

const EXEMPT_PATHS: &[&str] = &["/health"];

fn limit_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-limit")
}

fn remaining_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-remaining")
}

/// Applies fixed-window quotas before a request reaches its handler. Throttled
/// requests are answered directly with 429 and a Retry-After; admitted
/// requests pass through with their remaining quota in the response headers.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> RateLimit {
        RateLimit { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service,
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        if EXEMPT_PATHS.contains(&path.as_str()) {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let client = client_key(&req);
        let decision = self.limiter.allow(&client, &path);

        if !decision.allowed {
            warn!(
                client = client.as_str(),
                path = path.as_str(),
                retry_after = decision.retry_after_seconds,
                "throttled request"
            );
            let error = Error::RateLimitExceeded {
                retry_after_seconds: decision.retry_after_seconds,
            };
            let mut response = error.error_response();
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, int_header(decision.retry_after_seconds));
            headers.insert(limit_header(), int_header(decision.limit as u64));
            headers.insert(remaining_header(), int_header(0));
            let response = req.into_response(response).map_into_right_body();
            return Box::pin(async move { Ok(response) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut response = fut.await?.map_into_left_body();
            let headers = response.headers_mut();
            headers.insert(limit_header(), int_header(decision.limit as u64));
            headers.insert(remaining_header(), int_header(decision.remaining as u64));
            Ok(response)
        })
    }
}

fn int_header(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or(HeaderValue::from_static("0"))
}

/// Identifies the client for quota accounting: first X-Forwarded-For entry,
/// then X-Real-IP, then the peer address.
pub fn client_key(req: &ServiceRequest) -> String {
    if let Some(forwarded) = header_str(req, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(req, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(req: &'a ServiceRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::test::TestRequest;

    #[test]
    fn prefers_the_first_forwarded_address() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.9, 10.0.0.1"))
            .insert_header(("x-real-ip", "198.51.100.2"))
            .to_srv_request();

        assert_eq!(client_key(&req), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_the_real_ip_header() {
        let req = TestRequest::default()
            .insert_header(("x-real-ip", "198.51.100.2"))
            .to_srv_request();

        assert_eq!(client_key(&req), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_the_peer_address() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.7:40000".parse().unwrap())
            .to_srv_request();

        assert_eq!(client_key(&req), "192.0.2.7");
    }
}
