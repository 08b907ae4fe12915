use actix_web::{web, HttpRequest, HttpResponse};
use mongodb::Database;
use serde_json::json;

use crate::error::AppError;
use crate::middleware;
use crate::models::CreateOrderInput;
use crate::services;

/// POST /api/orders — checks the caller's cart out into an order.
pub async fn create_order(
    db: web::Data<Database>,
    req: HttpRequest,
    body: web::Json<CreateOrderInput>,
) -> Result<HttpResponse, AppError> {
    let auth = middleware::auth_user(&req)?;
    let order = services::orders::create_order(&db, auth.id, &body.address, body.status).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "order": order.public_json(),
    })))
}
