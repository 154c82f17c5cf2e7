//! API Key 认证中间件
//!
//! 仅保护 /api/ 下的 JSON 接口（健康检查除外），通过 Authorization: Bearer <token> 认证。
//! 页面始终公开；未配置密钥时不启用认证。

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
    body::EitherBody,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::models::ApiResponse;

/// API Key 中间件
pub struct ApiKeyMiddleware {
    api_key: Rc<String>,
}

impl ApiKeyMiddleware {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: Rc::new(api_key),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyMiddlewareService {
            service: Rc::new(service),
            api_key: self.api_key.clone(),
        })
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: Rc<S>,
    api_key: Rc<String>,
}

/// 该路径是否需要认证
fn requires_auth(path: &str) -> bool {
    path.starts_with("/api/") && !path.ends_with("/health")
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let api_key = self.api_key.clone();

        Box::pin(async move {
            if api_key.is_empty() || !requires_auth(req.path()) {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            // 验证 Bearer Token
            let provided_key = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));

            match provided_key {
                Some(key) if key == api_key.as_str() => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                _ => {
                    log::warn!("拒绝未认证请求: {}", req.path());
                    let response = HttpResponse::Unauthorized()
                        .json(ApiResponse::<()>::error("Invalid bearer token"));
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{call_service, init_service, TestRequest};
    use actix_web::{http::StatusCode, web, App};

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn status_of(key: &str, path: &str, token: Option<&str>) -> StatusCode {
        let app = init_service(
            App::new()
                .wrap(ApiKeyMiddleware::new(key.to_string()))
                .route("/", web::get().to(ok_handler))
                .route("/api/v1/health", web::get().to(ok_handler))
                .route("/api/v1/tickers", web::get().to(ok_handler)),
        )
        .await;

        let mut req = TestRequest::get().uri(path);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {}", token)));
        }
        call_service(&app, req.to_request()).await.status()
    }

    #[test]
    fn test_requires_auth_paths() {
        assert!(requires_auth("/api/v1/compare"));
        assert!(!requires_auth("/api/v1/health"));
        assert!(!requires_auth("/"));
    }

    #[actix_web::test]
    async fn test_disabled_without_key() {
        assert_eq!(status_of("", "/api/v1/tickers", None).await, StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_api_requires_token() {
        assert_eq!(status_of("secret", "/api/v1/tickers", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("secret", "/api/v1/tickers", Some("wrong")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("secret", "/api/v1/tickers", Some("secret")).await, StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_page_and_health_are_public() {
        assert_eq!(status_of("secret", "/", None).await, StatusCode::OK);
        assert_eq!(status_of("secret", "/api/v1/health", None).await, StatusCode::OK);
    }
}
