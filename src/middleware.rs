use actix_service::{forward_ready, Service};
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpRequest};
use futures::future::{ok, LocalBoxFuture, Ready};
use mongodb::bson::oid::ObjectId;
use std::rc::Rc;

use crate::auth::{self, AccessClaims};
use crate::error::AppError;
use crate::models::Role;

/// Request-scoped identity decoded from a bearer token. Attached to the
/// request extensions by [`AuthMiddleware`]; never re-fetched from the
/// database during authorization.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub role: Role,
}

impl AuthUser {
    fn from_claims(claims: &AccessClaims) -> Result<Self, AppError> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::Forbidden("Token is not valid".to_string()))?;
        let role = Role::try_from(claims.role)
            .map_err(|_| AppError::Forbidden("Token is not valid".to_string()))?;
        Ok(AuthUser { id, role })
    }
}

/// Reads the authenticated identity a handler runs under.
pub fn auth_user(req: &HttpRequest) -> Result<AuthUser, AppError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Authentication("Login required".to_string()))
}

// Middleware factory
pub struct AuthMiddleware {
    secret: String,
    require_admin: bool,
}

impl AuthMiddleware {
    pub fn new(secret: String) -> Self {
        AuthMiddleware {
            secret,
            require_admin: false,
        }
    }

    /// Variant for admin-gated routes: a valid token whose role is not
    /// the admin code is rejected with 403.
    pub fn admin(secret: String) -> Self {
        AuthMiddleware {
            secret,
            require_admin: true,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
            secret: self.secret.clone(),
            require_admin: self.require_admin,
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    secret: String,
    require_admin: bool,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let secret = self.secret.clone();
        let require_admin = self.require_admin;
        let service = self.service.clone();

        Box::pin(async move {
            // No Authorization header at all: unauthenticated.
            let header = match req.headers().get("Authorization") {
                Some(header) => header,
                None => {
                    return Err(AppError::Authentication("No token provided".to_string()).into())
                }
            };

            // A header that is present but unusable counts as an invalid
            // token, not a missing one.
            let token = match header
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
            {
                Some(token) => token,
                None => return Err(AppError::Forbidden("Token is not valid".to_string()).into()),
            };

            let claims = auth::decode_access_token(token, &secret)?;
            let user = AuthUser::from_claims(&claims)?;

            if require_admin && user.role != Role::Admin {
                return Err(AppError::Forbidden("Require admin role".to_string()).into());
            }

            req.extensions_mut().insert(user);
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App, HttpResponse};

    const SECRET: &str = "test-secret";

    async fn probe(req: HttpRequest) -> Result<HttpResponse, AppError> {
        let user = auth_user(&req)?;
        Ok(HttpResponse::Ok().json(user.id.to_hex()))
    }

    fn bearer(role: Role) -> String {
        let token = auth::issue_access_token(&ObjectId::new(), role, SECRET).unwrap();
        format!("Bearer {}", token)
    }

    async fn status_for(middleware: AuthMiddleware, auth_header: Option<&str>) -> StatusCode {
        let app = test::init_service(
            App::new().service(
                web::scope("")
                    .wrap(middleware)
                    .route("/probe", web::get().to(probe)),
            ),
        )
        .await;
        let mut req = test::TestRequest::get().uri("/probe");
        if let Some(value) = auth_header {
            req = req.insert_header(("Authorization", value));
        }
        match test::try_call_service(&app, req.to_request()).await {
            Ok(response) => response.status(),
            Err(err) => err.error_response().status(),
        }
    }

    #[actix_web::test]
    async fn test_missing_token_is_401() {
        let status = status_for(AuthMiddleware::new(SECRET.to_string()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_malformed_header_is_403() {
        let status =
            status_for(AuthMiddleware::new(SECRET.to_string()), Some("Token abc")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_invalid_token_is_403() {
        let status = status_for(
            AuthMiddleware::new(SECRET.to_string()),
            Some("Bearer not.a.token"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_wrong_secret_is_403() {
        let token = auth::issue_access_token(&ObjectId::new(), Role::Customer, "other").unwrap();
        let status = status_for(
            AuthMiddleware::new(SECRET.to_string()),
            Some(&format!("Bearer {}", token)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_valid_token_passes() {
        let header = bearer(Role::Customer);
        let status = status_for(AuthMiddleware::new(SECRET.to_string()), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_customer_rejected_on_admin_route() {
        let header = bearer(Role::Customer);
        let status = status_for(AuthMiddleware::admin(SECRET.to_string()), Some(&header)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_admin_passes_admin_route() {
        let header = bearer(Role::Admin);
        let status = status_for(AuthMiddleware::admin(SECRET.to_string()), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
