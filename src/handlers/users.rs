use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use mongodb::Database;
use serde_json::json;

use super::parse_object_id;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware;
use crate::models::{
    CartUpdateInput, ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput,
    UpdateUserInput,
};
use crate::services;

pub async fn register(
    db: web::Data<Database>,
    body: web::Json<RegisterInput>,
) -> Result<HttpResponse, AppError> {
    let user = services::users::register(&db, &body).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Registration successful, please log in",
        "user": user.public_json(),
    })))
}

pub async fn login(
    db: web::Data<Database>,
    config: web::Data<Config>,
    body: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let outcome = services::users::login(&db, &config, &body.email, &body.password).await?;

    // The refresh token travels only in an HTTP-only cookie.
    let cookie = Cookie::build("refreshToken", outcome.refresh_token.clone())
        .http_only(true)
        .max_age(CookieDuration::days(7))
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(json!({
        "success": true,
        "accessToken": outcome.access_token,
        "userData": outcome.user.public_json(),
    })))
}

pub async fn list_users(db: web::Data<Database>) -> Result<HttpResponse, AppError> {
    let users = services::users::list_users(&db).await?;
    let users: Vec<_> = users.iter().map(|user| user.public_json()).collect();
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    let user = services::users::get_user(&db, id).await?;
    Ok(HttpResponse::Ok().json(user.public_json()))
}

pub async fn update_user(
    db: web::Data<Database>,
    id: web::Path<String>,
    body: web::Json<UpdateUserInput>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    let user = services::users::update_user(&db, id, &body).await?;
    Ok(HttpResponse::Ok().json(user.public_json()))
}

pub async fn delete_user(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    services::users::delete_user(&db, id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "User deleted"})))
}

/// PUT /api/cart — upserts one line of the caller's own cart.
pub async fn update_cart(
    db: web::Data<Database>,
    req: HttpRequest,
    body: web::Json<CartUpdateInput>,
) -> Result<HttpResponse, AppError> {
    let auth = middleware::auth_user(&req)?;
    let product_id = parse_object_id(&body.product_id)?;
    services::users::set_cart_line(&db, auth.id, product_id, body.quantity).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "Updated your cart"})))
}

pub async fn add_to_wishlist(
    db: web::Data<Database>,
    req: HttpRequest,
    product_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let auth = middleware::auth_user(&req)?;
    let product_id = parse_object_id(&product_id)?;
    services::users::add_to_wishlist(&db, auth.id, product_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Product added to wishlist",
    })))
}

pub async fn remove_from_wishlist(
    db: web::Data<Database>,
    req: HttpRequest,
    product_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let auth = middleware::auth_user(&req)?;
    let product_id = parse_object_id(&product_id)?;
    services::users::remove_from_wishlist(&db, auth.id, product_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Product removed from wishlist",
    })))
}

/// No mailer is wired up; the raw token is returned to the caller.
pub async fn forgot_password(
    db: web::Data<Database>,
    body: web::Json<ForgotPasswordInput>,
) -> Result<HttpResponse, AppError> {
    let token = services::users::forgot_password(&db, &body.email).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "resetToken": token})))
}

pub async fn reset_password(
    db: web::Data<Database>,
    body: web::Json<ResetPasswordInput>,
) -> Result<HttpResponse, AppError> {
    services::users::reset_password(&db, &body.token, &body.password).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "Password updated"})))
}
