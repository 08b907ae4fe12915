use actix_web::{web, App, HttpServer};

mod auth;
mod config;
mod db;
mod error;
mod graphql;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;
use middleware::AuthMiddleware;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::init(); // Initialize the logger

    let config = Config::from_env().expect("configuration error");

    // Connect to the MongoDB database
    let db = db::connect(&config).await;
    log::info!("connected to database {}", config.database_name);

    // One schema instance shared by every worker
    let schema = graphql::build_schema(db.clone());

    let bind_addr = config.bind_addr.clone();
    log::info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        let jwt_secret = config.jwt_secret.clone();
        App::new()
            .app_data(web::Data::new(db.clone())) // Share the database handle with handlers
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(schema.clone()))
            // GraphQL surface; no authentication at the resolver layer
            .route("/graphql", web::post().to(graphql::graphql))
            .route("/graphql", web::get().to(graphql::graphiql))
            .service(
                web::scope("/api")
                    // Public routes
                    .route("/register", web::post().to(handlers::users::register))
                    .route("/login", web::post().to(handlers::users::login))
                    .route("/forgot-password", web::post().to(handlers::users::forgot_password))
                    .route("/reset-password", web::put().to(handlers::users::reset_password))
                    .route("/brands", web::post().to(handlers::catalog::create_brand))
                    .route("/brands", web::get().to(handlers::catalog::list_brands))
                    .route("/categories", web::post().to(handlers::catalog::create_category))
                    .route("/categories", web::get().to(handlers::catalog::list_categories))
                    // Admin-gated routes
                    .service(
                        web::scope("/products")
                            .wrap(AuthMiddleware::admin(jwt_secret.clone()))
                            .route("", web::post().to(handlers::catalog::create_product))
                            .route("", web::get().to(handlers::catalog::list_products))
                            .route("/{id}", web::get().to(handlers::catalog::get_product))
                            .route("/{id}", web::put().to(handlers::catalog::update_product))
                            .route("/{id}", web::delete().to(handlers::catalog::delete_product)),
                    )
                    .service(
                        web::resource("/users")
                            .wrap(AuthMiddleware::admin(jwt_secret.clone()))
                            .route(web::get().to(handlers::users::list_users)),
                    )
                    // Bearer-gated routes
                    .service(
                        web::scope("")
                            .wrap(AuthMiddleware::new(jwt_secret))
                            .route("/users/{id}", web::get().to(handlers::users::get_user))
                            .route("/users/{id}", web::put().to(handlers::users::update_user))
                            .route("/users/{id}", web::delete().to(handlers::users::delete_user))
                            .route("/cart", web::put().to(handlers::users::update_cart))
                            .route(
                                "/wishlist/{product_id}",
                                web::post().to(handlers::users::add_to_wishlist),
                            )
                            .route(
                                "/wishlist/{product_id}",
                                web::delete().to(handlers::users::remove_from_wishlist),
                            )
                            .route("/orders", web::post().to(handlers::orders::create_order)),
                    ),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await
}
