use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::HeaderName, StatusCode},
    Error, HttpResponse,
};
use dashmap::DashMap;
use futures_util::Future;
use log::warn;
use std::{
    future::{ready, Ready},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use subtle::ConstantTimeEq;

const HEALTH_PATH: &str = "/health";

/// API-key check and per-client rate limit in front of the gateway routes.
#[derive(Clone)]
pub struct GatewayAuthConfig {
    api_key: Arc<Vec<u8>>,
    header_name: HeaderName,
    limiter: RateLimiter,
    trust_forwarded: bool,
}

/// Fixed-window request counter keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Arc<DashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Counts one request from `client`; false once the window's budget is spent.
    pub fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert((0, now));
        let (count, started) = &mut *entry;

        if now.duration_since(*started) >= self.window {
            *count = 0;
            *started = now;
        }
        if *count >= self.max_requests {
            return false;
        }
        *count += 1;
        true
    }

    /// Drops windows that have expired.
    pub fn purge(&self) {
        let now = Instant::now();
        let window = self.window;
        self.windows
            .retain(|_, (_, started)| now.duration_since(*started) < window);
    }
}

impl GatewayAuthConfig {
    pub fn new(api_key: &str, max_requests: u32, window: Duration) -> Self {
        Self {
            api_key: Arc::new(api_key.as_bytes().to_vec()),
            header_name: HeaderName::from_static("x-service-key"),
            limiter: RateLimiter::new(max_requests, window),
            trust_forwarded: false,
        }
    }

    /// Keys the rate limit on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub fn with_trusted_proxy(mut self, trusted: bool) -> Self {
        self.trust_forwarded = trusted;
        self
    }

    pub fn with_header_name(
        mut self,
        name: &str,
    ) -> Result<Self, actix_web::http::header::InvalidHeaderName> {
        self.header_name = HeaderName::try_from(name)?;
        Ok(self)
    }

    /// Periodically purges expired rate-limit windows. Needs a running Tokio runtime.
    pub fn start_cleanup_task(&self) {
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let period = (limiter.window / 2).max(Duration::from_millis(1));
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                limiter.purge();
            }
        });
    }
}

pub struct GatewayAuth {
    config: GatewayAuthConfig,
}

impl GatewayAuth {
    pub fn new(config: GatewayAuthConfig) -> Self {
        Self { config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GatewayAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = GatewayAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GatewayAuthService {
            service: Arc::new(service),
            config: self.config.clone(),
        }))
    }
}

pub struct GatewayAuthService<S> {
    service: Arc<S>,
    config: GatewayAuthConfig,
}

impl<S, B> Service<ServiceRequest> for GatewayAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let config = self.config.clone();
        let service = self.service.clone();

        Box::pin(async move {
            if req.path() == HEALTH_PATH {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }

            let presented = match req.headers().get(&config.header_name) {
                Some(value) => value.as_bytes().to_vec(),
                None => {
                    return Ok(reject(req, StatusCode::UNAUTHORIZED, "Missing API key"));
                }
            };

            if presented.ct_eq(&config.api_key).unwrap_u8() != 1 {
                warn!("Rejected request with invalid API key");
                return Ok(reject(req, StatusCode::FORBIDDEN, "Invalid API key"));
            }

            let client = client_key(&req, config.trust_forwarded);
            if !config.limiter.allow(&client) {
                warn!("Rate limit exceeded for {}", client);
                return Ok(reject(
                    req,
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded",
                ));
            }

            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn client_key(req: &ServiceRequest, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn reject(req: ServiceRequest, status: StatusCode, message: &str) -> ServiceResponse<BoxBody> {
    let response = HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "data": null,
        "error": {
            "kind": "Gateway",
            "message": message,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }));

    req.into_response(response).map_into_boxed_body()
}
