use mongodb::{options::ClientOptions, Client, Collection, Database};

use crate::config::Config;
use crate::models::{Brand, Category, Order, Product, User};

pub async fn connect(config: &Config) -> Database {
    // Parse the connection string into client options
    let client_options = ClientOptions::parse(&config.database_url)
        .await
        .expect("Failed to parse MongoDB connection string");

    // Initialize the MongoDB client
    let client = Client::with_options(client_options).expect("Failed to initialize MongoDB client");

    client.database(&config.database_name)
}

// One collection per entity; cross-entity references are plain ObjectIds
// resolved at read time.

pub fn users(db: &Database) -> Collection<User> {
    db.collection("users")
}

pub fn products(db: &Database) -> Collection<Product> {
    db.collection("products")
}

pub fn brands(db: &Database) -> Collection<Brand> {
    db.collection("brands")
}

pub fn categories(db: &Database) -> Collection<Category> {
    db.collection("categories")
}

pub fn orders(db: &Database) -> Collection<Order> {
    db.collection("orders")
}
