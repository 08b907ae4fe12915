use async_graphql::{Enum, SimpleObject};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// User role, stored and carried in token claims as one of two integer
/// codes: 1945 for administrators, 1979 for customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    Admin,
    Customer,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> i32 {
        match role {
            Role::Admin => 1945,
            Role::Customer => 1979,
        }
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1945 => Ok(Role::Admin),
            1979 => Ok(Role::Customer),
            other => Err(format!("unknown role code {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum, Default)]
pub enum OrderStatus {
    Cancelled,
    #[default]
    Successful,
}

/// A per-user, per-product purchase intent. Price, name and image are a
/// snapshot of the product at the time the line was added or updated, not
/// a live join.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct CartLine {
    pub product: ObjectId,
    pub quantity: i32,
    pub price: f64,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    #[graphql(skip)]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub cart: Vec<CartLine>,
    pub address: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub wishlist: Vec<ObjectId>,
    #[serde(default)]
    pub is_blocked: bool,
    #[graphql(skip)]
    pub refresh_token: Option<String>,
    #[graphql(skip)]
    pub password_reset_token: Option<String>,
    #[graphql(skip)]
    pub password_reset_expires: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    /// Builds a new user from validated registration input. `password` must
    /// already be hashed; defaults live here, not in the storage layer.
    pub fn new(input: &RegisterInput, hashed_password: String) -> Self {
        let now = DateTime::now();
        User {
            id: None,
            firstname: input.firstname.clone(),
            lastname: input.lastname.clone(),
            email: input.email.clone(),
            mobile: input.mobile.clone(),
            password: hashed_password,
            role: input.role.unwrap_or_default(),
            cart: Vec::new(),
            address: Some(input.address.clone()),
            avatar: input.avatar.clone(),
            wishlist: Vec::new(),
            is_blocked: false,
            refresh_token: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Client-facing projection: no password hash, no refresh token, no
    /// reset-token material.
    pub fn public_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "firstname": self.firstname,
            "lastname": self.lastname,
            "email": self.email,
            "mobile": self.mobile,
            "role": i32::from(self.role),
            "cart": self.cart.iter().map(|line| json!({
                "product": line.product.to_hex(),
                "quantity": line.quantity,
                "price": line.price,
                "name": line.name,
                "image": line.image,
            })).collect::<Vec<_>>(),
            "address": self.address,
            "avatar": self.avatar,
            "wishlist": self.wishlist.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
            "isBlocked": self.is_blocked,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub description: String,
    pub image: String,
    #[graphql(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<ObjectId>,
    #[graphql(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct Brand {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Brand {
    pub fn new(name: String) -> Self {
        let now = DateTime::now();
        Brand {
            id: None,
            name,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn public_json(&self) -> serde_json::Value {
        json!({ "id": self.id.map(|id| id.to_hex()), "name": self.name })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Category {
    pub fn new(name: String) -> Self {
        let now = DateTime::now();
        Category {
            id: None,
            name,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn public_json(&self) -> serde_json::Value {
        json!({ "id": self.id.map(|id| id.to_hex()), "name": self.name })
    }
}

/// A frozen copy of a cart line. Orders stay accurate even when the
/// referenced product is changed or deleted later.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct OrderLine {
    pub product: ObjectId,
    pub quantity: i32,
    pub price: f64,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub products: Vec<OrderLine>,
    pub total: f64,
    pub status: OrderStatus,
    pub order_by: ObjectId,
    pub address: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Order {
    pub fn new(
        order_by: ObjectId,
        address: String,
        products: Vec<OrderLine>,
        total: f64,
        status: OrderStatus,
    ) -> Self {
        let now = DateTime::now();
        Order {
            id: None,
            products,
            total,
            status,
            order_by,
            address,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn public_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "products": self.products.iter().map(|line| json!({
                "product": line.product.to_hex(),
                "quantity": line.quantity,
                "price": line.price,
                "name": line.name,
                "image": line.image,
            })).collect::<Vec<_>>(),
            "total": self.total,
            "status": self.status,
            "orderBy": self.order_by.to_hex(),
            "address": self.address,
        })
    }
}

// Request bodies. Validation happens explicitly in the service layer
// before anything touches the store.

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub address: String,
    pub avatar: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct CartUpdateInput {
    pub product_id: String,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub address: String,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordInput {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub description: String,
    pub image: String,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductBody {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

/// Shared by brand and category creation.
#[derive(Debug, Deserialize)]
pub struct NameInput {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        assert_eq!(i32::from(Role::Admin), 1945);
        assert_eq!(i32::from(Role::Customer), 1979);
        assert_eq!(Role::try_from(1945).unwrap(), Role::Admin);
        assert_eq!(Role::try_from(1979).unwrap(), Role::Customer);
        assert!(Role::try_from(42).is_err());
    }

    #[test]
    fn test_role_serializes_as_integer() {
        let value = serde_json::to_value(Role::Admin).unwrap();
        assert_eq!(value, serde_json::json!(1945));
        let role: Role = serde_json::from_value(serde_json::json!(1979)).unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_order_status_defaults_to_successful() {
        assert_eq!(OrderStatus::default(), OrderStatus::Successful);
    }

    #[test]
    fn test_public_json_hides_credentials() {
        let input = RegisterInput {
            firstname: "An".to_string(),
            lastname: "Nguyen".to_string(),
            email: "an@example.com".to_string(),
            mobile: "0987654321".to_string(),
            password: "ignored".to_string(),
            address: "1 Main St".to_string(),
            avatar: None,
            role: None,
        };
        let user = User::new(&input, "argon2-hash".to_string());
        let value = user.public_json();
        assert!(value.get("password").is_none());
        assert!(value.get("refresh_token").is_none());
        assert_eq!(value["role"], serde_json::json!(1979));
    }
}
