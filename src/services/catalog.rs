use std::collections::HashMap;

use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use serde_json::json;

use crate::db;
use crate::error::AppError;
use crate::models::{Brand, Category, Product, ProductQuery};

/// Validated product fields ready for persistence. Brand and category are
/// weak references; they are resolved from names by the GraphQL adapter and
/// passed through as ids by the REST adapter.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub description: String,
    pub image: String,
    pub brand: Option<ObjectId>,
    pub category: Option<ObjectId>,
}

#[derive(Debug, Default, Clone)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub brand: Option<ObjectId>,
    pub category: Option<ObjectId>,
}

pub async fn create_brand(db: &Database, name: &str) -> Result<Brand, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Brand name is required".to_string()));
    }
    let mut brand = Brand::new(name.trim().to_string());
    let result = db::brands(db).insert_one(&brand, None).await?;
    brand.id = result.inserted_id.as_object_id();
    Ok(brand)
}

pub async fn list_brands(db: &Database) -> Result<Vec<Brand>, AppError> {
    let mut cursor = db::brands(db).find(None, None).await?;
    let mut brands = vec![];
    while let Some(brand) = cursor.next().await {
        brands.push(brand?);
    }
    Ok(brands)
}

pub async fn find_brand(db: &Database, id: ObjectId) -> Result<Option<Brand>, AppError> {
    Ok(db::brands(db).find_one(doc! {"_id": id}, None).await?)
}

/// Case-insensitive exact-name lookup.
pub async fn find_brand_by_name(db: &Database, name: &str) -> Result<Option<Brand>, AppError> {
    let filter = doc! {"name": {"$regex": format!("^{}$", escape_regex(name)), "$options": "i"}};
    Ok(db::brands(db).find_one(filter, None).await?)
}

pub async fn create_category(db: &Database, name: &str) -> Result<Category, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Category name is required".to_string()));
    }
    let mut category = Category::new(name.trim().to_string());
    let result = db::categories(db).insert_one(&category, None).await?;
    category.id = result.inserted_id.as_object_id();
    Ok(category)
}

pub async fn list_categories(db: &Database) -> Result<Vec<Category>, AppError> {
    let mut cursor = db::categories(db).find(None, None).await?;
    let mut categories = vec![];
    while let Some(category) = cursor.next().await {
        categories.push(category?);
    }
    Ok(categories)
}

pub async fn find_category(db: &Database, id: ObjectId) -> Result<Option<Category>, AppError> {
    Ok(db::categories(db).find_one(doc! {"_id": id}, None).await?)
}

pub async fn find_category_by_name(
    db: &Database,
    name: &str,
) -> Result<Option<Category>, AppError> {
    let filter = doc! {"name": {"$regex": format!("^{}$", escape_regex(name)), "$options": "i"}};
    Ok(db::categories(db).find_one(filter, None).await?)
}

pub async fn create_product(db: &Database, new: NewProduct) -> Result<Product, AppError> {
    validate_product(&new)?;
    let now = DateTime::now();
    let mut product = Product {
        id: None,
        name: new.name,
        price: new.price,
        quantity: new.quantity,
        description: new.description,
        image: new.image,
        brand: new.brand,
        category: new.category,
        created_at: now,
        updated_at: now,
    };
    let result = db::products(db).insert_one(&product, None).await?;
    product.id = result.inserted_id.as_object_id();
    Ok(product)
}

pub async fn list_products(db: &Database, query: &ProductQuery) -> Result<Vec<Product>, AppError> {
    let filter = build_product_filter(query)?;
    let options = FindOptions::builder().limit(query.limit).build();
    let mut cursor = db::products(db).find(filter, options).await?;
    let mut products = vec![];
    while let Some(product) = cursor.next().await {
        products.push(product?);
    }
    Ok(products)
}

pub async fn find_product(db: &Database, id: ObjectId) -> Result<Option<Product>, AppError> {
    Ok(db::products(db).find_one(doc! {"_id": id}, None).await?)
}

pub async fn get_product(db: &Database, id: ObjectId) -> Result<Product, AppError> {
    find_product(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

pub async fn update_product(
    db: &Database,
    id: ObjectId,
    update: &ProductUpdate,
) -> Result<Product, AppError> {
    let mut set = Document::new();
    if let Some(name) = &update.name {
        set.insert("name", name);
    }
    if let Some(price) = update.price {
        if price < 0.0 {
            return Err(AppError::Validation(
                "Price must be non-negative".to_string(),
            ));
        }
        set.insert("price", price);
    }
    if let Some(quantity) = update.quantity {
        if quantity < 0 {
            return Err(AppError::Validation(
                "Quantity must be non-negative".to_string(),
            ));
        }
        set.insert("quantity", quantity);
    }
    if let Some(description) = &update.description {
        set.insert("description", description);
    }
    if let Some(image) = &update.image {
        set.insert("image", image);
    }
    if let Some(brand) = update.brand {
        set.insert("brand", brand);
    }
    if let Some(category) = update.category {
        set.insert("category", category);
    }

    if set.is_empty() {
        return get_product(db, id).await;
    }
    set.insert("updated_at", DateTime::now());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    db::products(db)
        .find_one_and_update(doc! {"_id": id}, doc! {"$set": set}, options)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Deletes the product and returns the removed document.
pub async fn delete_product(db: &Database, id: ObjectId) -> Result<Product, AppError> {
    db::products(db)
        .find_one_and_delete(doc! {"_id": id}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Read-model assembly: batch-resolves the brand and category references
/// of a product page and composes JSON with the referenced names embedded.
pub async fn products_json(db: &Database, products: &[Product]) -> Result<Vec<serde_json::Value>, AppError> {
    let brand_ids: Vec<ObjectId> = products.iter().filter_map(|p| p.brand).collect();
    let category_ids: Vec<ObjectId> = products.iter().filter_map(|p| p.category).collect();

    let mut brands = HashMap::new();
    if !brand_ids.is_empty() {
        let mut cursor = db::brands(db)
            .find(doc! {"_id": {"$in": brand_ids}}, None)
            .await?;
        while let Some(brand) = cursor.next().await {
            let brand = brand?;
            if let Some(id) = brand.id {
                brands.insert(id, brand);
            }
        }
    }
    let mut categories = HashMap::new();
    if !category_ids.is_empty() {
        let mut cursor = db::categories(db)
            .find(doc! {"_id": {"$in": category_ids}}, None)
            .await?;
        while let Some(category) = cursor.next().await {
            let category = category?;
            if let Some(id) = category.id {
                categories.insert(id, category);
            }
        }
    }

    Ok(products
        .iter()
        .map(|product| product_json(product, &brands, &categories))
        .collect())
}

fn product_json(
    product: &Product,
    brands: &HashMap<ObjectId, Brand>,
    categories: &HashMap<ObjectId, Category>,
) -> serde_json::Value {
    json!({
        "id": product.id.map(|id| id.to_hex()),
        "name": product.name,
        "price": product.price,
        "quantity": product.quantity,
        "description": product.description,
        "image": product.image,
        "brand": product.brand.and_then(|id| brands.get(&id)).map(Brand::public_json),
        "category": product.category.and_then(|id| categories.get(&id)).map(Category::public_json),
    })
}

fn validate_product(new: &NewProduct) -> Result<(), AppError> {
    if new.name.trim().is_empty()
        || new.description.trim().is_empty()
        || new.image.trim().is_empty()
    {
        return Err(AppError::Validation(
            "Name, description and image are required".to_string(),
        ));
    }
    if new.price < 0.0 {
        return Err(AppError::Validation(
            "Price must be non-negative".to_string(),
        ));
    }
    if new.quantity < 0 {
        return Err(AppError::Validation(
            "Quantity must be non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Builds the list filter. Name matches as a case-insensitive substring;
/// brand and category filter by referenced id; price bounds are inclusive.
pub fn build_product_filter(query: &ProductQuery) -> Result<Document, AppError> {
    let mut filter = Document::new();
    if let Some(name) = &query.name {
        filter.insert("name", doc! {"$regex": escape_regex(name), "$options": "i"});
    }
    if let Some(brand) = &query.brand {
        let id = ObjectId::parse_str(brand)
            .map_err(|_| AppError::Validation("Invalid brand id".to_string()))?;
        filter.insert("brand", id);
    }
    if let Some(category) = &query.category {
        let id = ObjectId::parse_str(category)
            .map_err(|_| AppError::Validation("Invalid category id".to_string()))?;
        filter.insert("category", id);
    }
    let mut price = Document::new();
    if let Some(min) = query.price_min {
        price.insert("$gte", min);
    }
    if let Some(max) = query.price_max {
        price.insert("$lte", max);
    }
    if !price.is_empty() {
        filter.insert("price", price);
    }
    Ok(filter)
}

/// Escapes a user-supplied string for use inside a `$regex` filter.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            name: "Phone".to_string(),
            price: 499.0,
            quantity: 10,
            description: "A phone".to_string(),
            image: "phone.png".to_string(),
            brand: None,
            category: None,
        }
    }

    #[test]
    fn test_validate_product_accepts_complete_input() {
        assert!(validate_product(&new_product()).is_ok());
    }

    #[test]
    fn test_validate_product_rejects_missing_fields() {
        let mut missing_name = new_product();
        missing_name.name = "  ".to_string();
        assert!(validate_product(&missing_name).is_err());

        let mut negative_price = new_product();
        negative_price.price = -1.0;
        assert!(validate_product(&negative_price).is_err());

        let mut negative_stock = new_product();
        negative_stock.quantity = -3;
        assert!(validate_product(&negative_stock).is_err());
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("usb-c"), "usb-c");
        assert_eq!(escape_regex("a.b"), "a\\.b");
        assert_eq!(escape_regex("(tv)"), "\\(tv\\)");
        assert_eq!(escape_regex("50%+"), "50%\\+");
    }

    #[test]
    fn test_build_product_filter_name_and_price() {
        let query = ProductQuery {
            name: Some("phone".to_string()),
            price_min: Some(100.0),
            price_max: Some(500.0),
            ..Default::default()
        };
        let filter = build_product_filter(&query).unwrap();
        let name = filter.get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), "phone");
        assert_eq!(name.get_str("$options").unwrap(), "i");
        let price = filter.get_document("price").unwrap();
        assert_eq!(price.get_f64("$gte").unwrap(), 100.0);
        assert_eq!(price.get_f64("$lte").unwrap(), 500.0);
    }

    #[test]
    fn test_build_product_filter_by_refs() {
        let brand = ObjectId::new();
        let category = ObjectId::new();
        let query = ProductQuery {
            brand: Some(brand.to_hex()),
            category: Some(category.to_hex()),
            ..Default::default()
        };
        let filter = build_product_filter(&query).unwrap();
        assert_eq!(filter.get_object_id("brand").unwrap(), brand);
        assert_eq!(filter.get_object_id("category").unwrap(), category);
    }

    #[test]
    fn test_build_product_filter_rejects_bad_ids() {
        let query = ProductQuery {
            brand: Some("not-an-id".to_string()),
            ..Default::default()
        };
        assert!(build_product_filter(&query).is_err());
    }

    #[test]
    fn test_build_product_filter_empty_query() {
        let filter = build_product_filter(&ProductQuery::default()).unwrap();
        assert!(filter.is_empty());
    }
}
