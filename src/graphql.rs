use actix_web::{web, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql::{ComplexObject, Context, EmptySubscription, Object, Result, Schema};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};
use mongodb::bson::oid::ObjectId;
use mongodb::Database;

use crate::error::AppError;
use crate::models::{
    Brand, Category, Order, OrderStatus, Product, RegisterInput, Role, UpdateUserInput, User,
};
use crate::services::catalog::{self, NewProduct, ProductUpdate};
use crate::services::{orders, users};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(db: Database) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .finish()
}

pub async fn graphql(schema: web::Data<AppSchema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

pub async fn graphiql() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/graphql").finish())
}

// Reference fields resolve their documents on demand instead of relying on
// stored denormalization.

#[ComplexObject]
impl Product {
    async fn brand(&self, ctx: &Context<'_>) -> Result<Option<Brand>> {
        let db = ctx.data_unchecked::<Database>();
        match self.brand {
            Some(id) => Ok(catalog::find_brand(db, id).await?),
            None => Ok(None),
        }
    }

    async fn category(&self, ctx: &Context<'_>) -> Result<Option<Category>> {
        let db = ctx.data_unchecked::<Database>();
        match self.category {
            Some(id) => Ok(catalog::find_category(db, id).await?),
            None => Ok(None),
        }
    }
}

#[ComplexObject]
impl Order {
    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(users::find_user(db, self.order_by).await?)
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(users::list_users(db).await?)
    }

    async fn user(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<User>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(users::find_user(db, id).await?)
    }

    async fn products(&self, ctx: &Context<'_>) -> Result<Vec<Product>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::list_products(db, &Default::default()).await?)
    }

    async fn product(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Product>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::find_product(db, id).await?)
    }

    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<Category>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::list_categories(db).await?)
    }

    async fn category(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Category>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::find_category(db, id).await?)
    }

    async fn brands(&self, ctx: &Context<'_>) -> Result<Vec<Brand>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::list_brands(db).await?)
    }

    async fn brand(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Brand>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::find_brand(db, id).await?)
    }

    async fn orders(&self, ctx: &Context<'_>) -> Result<Vec<Order>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(orders::list_orders(db).await?)
    }

    async fn order(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Order>> {
        let db = ctx.data_unchecked::<Database>();
        Ok(orders::find_order(db, id).await?)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Same validation, uniqueness checks and hashing as REST registration.
    #[allow(clippy::too_many_arguments)]
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        firstname: String,
        lastname: String,
        email: String,
        mobile: String,
        password: String,
        address: String,
        avatar: Option<String>,
        role: Option<Role>,
    ) -> Result<User> {
        let db = ctx.data_unchecked::<Database>();
        let input = RegisterInput {
            firstname,
            lastname,
            email,
            mobile,
            password,
            address,
            avatar,
            role,
        };
        Ok(users::register(db, &input).await?)
    }

    /// Brand and category are given by name and resolved case-insensitively.
    #[allow(clippy::too_many_arguments)]
    async fn create_product(
        &self,
        ctx: &Context<'_>,
        name: String,
        price: f64,
        quantity: i32,
        category: String,
        brand: String,
        image: String,
        description: String,
    ) -> Result<Product> {
        let db = ctx.data_unchecked::<Database>();
        let category = catalog::find_category_by_name(db, &category)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        let brand = catalog::find_brand_by_name(db, &brand)
            .await?
            .ok_or_else(|| AppError::NotFound("Brand not found".to_string()))?;
        Ok(catalog::create_product(
            db,
            NewProduct {
                name,
                price,
                quantity,
                description,
                image,
                brand: brand.id,
                category: category.id,
            },
        )
        .await?)
    }

    async fn create_category(&self, ctx: &Context<'_>, name: String) -> Result<Category> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::create_category(db, &name).await?)
    }

    async fn create_brand(&self, ctx: &Context<'_>, name: String) -> Result<Brand> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::create_brand(db, &name).await?)
    }

    /// Checks the given user's cart out, exactly like POST /api/orders.
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        user_id: ObjectId,
        address: String,
        status: Option<OrderStatus>,
    ) -> Result<Order> {
        let db = ctx.data_unchecked::<Database>();
        Ok(orders::create_order(db, user_id, &address, status).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ObjectId,
        firstname: Option<String>,
        lastname: Option<String>,
        email: Option<String>,
        mobile: Option<String>,
        password: Option<String>,
        address: Option<String>,
        avatar: Option<String>,
        role: Option<Role>,
    ) -> Result<User> {
        let db = ctx.data_unchecked::<Database>();
        let input = UpdateUserInput {
            firstname,
            lastname,
            email,
            mobile,
            address,
            avatar,
            password,
            role,
        };
        Ok(users::update_user(db, id, &input).await?)
    }

    /// Unknown brand or category names are skipped rather than rejected.
    #[allow(clippy::too_many_arguments)]
    async fn update_product(
        &self,
        ctx: &Context<'_>,
        id: ObjectId,
        name: Option<String>,
        price: Option<f64>,
        quantity: Option<i32>,
        category: Option<String>,
        brand: Option<String>,
        image: Option<String>,
        description: Option<String>,
    ) -> Result<Product> {
        let db = ctx.data_unchecked::<Database>();
        let mut update = ProductUpdate {
            name,
            price,
            quantity,
            description,
            image,
            ..Default::default()
        };
        if let Some(category) = category {
            if let Some(found) = catalog::find_category_by_name(db, &category).await? {
                update.category = found.id;
            }
        }
        if let Some(brand) = brand {
            if let Some(found) = catalog::find_brand_by_name(db, &brand).await? {
                update.brand = found.id;
            }
        }
        Ok(catalog::update_product(db, id, &update).await?)
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ObjectId) -> Result<User> {
        let db = ctx.data_unchecked::<Database>();
        Ok(users::delete_user(db, id).await?)
    }

    async fn delete_product(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Product> {
        let db = ctx.data_unchecked::<Database>();
        Ok(catalog::delete_product(db, id).await?)
    }
}
