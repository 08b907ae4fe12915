use actix_web::{web, HttpResponse};
use mongodb::Database;
use serde_json::json;

use super::parse_object_id;
use crate::error::AppError;
use crate::models::{NameInput, ProductInput, ProductQuery, UpdateProductBody};
use crate::services::catalog::{self, NewProduct, ProductUpdate};

pub async fn create_brand(
    db: web::Data<Database>,
    body: web::Json<NameInput>,
) -> Result<HttpResponse, AppError> {
    let brand = catalog::create_brand(&db, &body.name).await?;
    Ok(HttpResponse::Created().json(brand.public_json()))
}

pub async fn list_brands(db: web::Data<Database>) -> Result<HttpResponse, AppError> {
    let brands = catalog::list_brands(&db).await?;
    let brands: Vec<_> = brands.iter().map(|brand| brand.public_json()).collect();
    Ok(HttpResponse::Ok().json(brands))
}

pub async fn create_category(
    db: web::Data<Database>,
    body: web::Json<NameInput>,
) -> Result<HttpResponse, AppError> {
    let category = catalog::create_category(&db, &body.name).await?;
    Ok(HttpResponse::Created().json(category.public_json()))
}

pub async fn list_categories(db: web::Data<Database>) -> Result<HttpResponse, AppError> {
    let categories = catalog::list_categories(&db).await?;
    let categories: Vec<_> = categories
        .iter()
        .map(|category| category.public_json())
        .collect();
    Ok(HttpResponse::Ok().json(categories))
}

pub async fn create_product(
    db: web::Data<Database>,
    body: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
    let brand = body.brand.as_deref().map(parse_object_id).transpose()?;
    let category = body.category.as_deref().map(parse_object_id).transpose()?;
    let product = catalog::create_product(
        &db,
        NewProduct {
            name: body.name.clone(),
            price: body.price,
            quantity: body.quantity,
            description: body.description.clone(),
            image: body.image.clone(),
            brand,
            category,
        },
    )
    .await?;
    let composed = catalog::products_json(&db, std::slice::from_ref(&product)).await?;
    Ok(HttpResponse::Created().json(&composed[0]))
}

/// GET /api/products — supports name/brand/category/price filters and an
/// optional result limit.
pub async fn list_products(
    db: web::Data<Database>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    let products = catalog::list_products(&db, &query).await?;
    let composed = catalog::products_json(&db, &products).await?;
    Ok(HttpResponse::Ok().json(composed))
}

pub async fn get_product(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    let product = catalog::get_product(&db, id).await?;
    let composed = catalog::products_json(&db, std::slice::from_ref(&product)).await?;
    Ok(HttpResponse::Ok().json(&composed[0]))
}

pub async fn update_product(
    db: web::Data<Database>,
    id: web::Path<String>,
    body: web::Json<UpdateProductBody>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    let brand = body.brand.as_deref().map(parse_object_id).transpose()?;
    let category = body.category.as_deref().map(parse_object_id).transpose()?;
    let update = ProductUpdate {
        name: body.name.clone(),
        price: body.price,
        quantity: body.quantity,
        description: body.description.clone(),
        image: body.image.clone(),
        brand,
        category,
    };
    let product = catalog::update_product(&db, id, &update).await?;
    let composed = catalog::products_json(&db, std::slice::from_ref(&product)).await?;
    Ok(HttpResponse::Ok().json(&composed[0]))
}

pub async fn delete_product(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id)?;
    catalog::delete_product(&db, id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "Product deleted"})))
}
