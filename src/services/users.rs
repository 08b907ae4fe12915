use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;

use crate::auth;
use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::models::{CartLine, RegisterInput, UpdateUserInput, User};

const RESET_TOKEN_TTL_MILLIS: i64 = 15 * 60 * 1000;

pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Creates an account. The password is hashed before anything is persisted
/// and both unique keys (email, mobile) are checked first.
pub async fn register(db: &Database, input: &RegisterInput) -> Result<User, AppError> {
    validate_registration(input)?;

    let users = db::users(db);
    if users
        .find_one(doc! {"email": &input.email}, None)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Email is already registered, please try another".to_string(),
        ));
    }
    if users
        .find_one(doc! {"mobile": &input.mobile}, None)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Mobile number already belongs to another account".to_string(),
        ));
    }

    let hashed = auth::hash_password(&input.password)?;
    let mut user = User::new(input, hashed);
    let result = users.insert_one(&user, None).await?;
    user.id = result.inserted_id.as_object_id();
    Ok(user)
}

/// Verifies credentials, rotates the stored refresh token and issues a
/// fresh access token.
pub async fn login(
    db: &Database,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AppError> {
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Please provide login credentials".to_string(),
        ));
    }

    let users = db::users(db);
    let user = users
        .find_one(doc! {"email": email}, None)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

    if !auth::verify_password(password, &user.password) {
        return Err(AppError::Authentication("Invalid credentials".to_string()));
    }
    if user.is_blocked {
        return Err(AppError::Forbidden("Account is blocked".to_string()));
    }

    let id = user
        .id
        .ok_or_else(|| AppError::Internal("user document missing id".to_string()))?;
    let access_token = auth::issue_access_token(&id, user.role, &config.jwt_secret)?;
    let refresh_token = auth::issue_refresh_token(&id, &config.refresh_secret)?;

    users
        .update_one(
            doc! {"_id": id},
            doc! {"$set": {"refresh_token": &refresh_token, "updated_at": DateTime::now()}},
            None,
        )
        .await?;

    Ok(LoginOutcome {
        user,
        access_token,
        refresh_token,
    })
}

pub async fn list_users(db: &Database) -> Result<Vec<User>, AppError> {
    let mut cursor = db::users(db).find(None, None).await?;
    let mut users = vec![];
    while let Some(user) = cursor.next().await {
        users.push(user?);
    }
    Ok(users)
}

pub async fn find_user(db: &Database, id: ObjectId) -> Result<Option<User>, AppError> {
    Ok(db::users(db).find_one(doc! {"_id": id}, None).await?)
}

pub async fn get_user(db: &Database, id: ObjectId) -> Result<User, AppError> {
    find_user(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn update_user(
    db: &Database,
    id: ObjectId,
    input: &UpdateUserInput,
) -> Result<User, AppError> {
    let users = db::users(db);
    let mut set = Document::new();

    if let Some(firstname) = &input.firstname {
        set.insert("firstname", firstname);
    }
    if let Some(lastname) = &input.lastname {
        set.insert("lastname", lastname);
    }
    if let Some(email) = &input.email {
        if !valid_email(email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
        // Unique keys stay unique across updates too.
        if users
            .find_one(doc! {"email": email, "_id": {"$ne": id}}, None)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Email is already registered, please try another".to_string(),
            ));
        }
        set.insert("email", email);
    }
    if let Some(mobile) = &input.mobile {
        if users
            .find_one(doc! {"mobile": mobile, "_id": {"$ne": id}}, None)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Mobile number already belongs to another account".to_string(),
            ));
        }
        set.insert("mobile", mobile);
    }
    if let Some(address) = &input.address {
        set.insert("address", address);
    }
    if let Some(avatar) = &input.avatar {
        set.insert("avatar", avatar);
    }
    if let Some(password) = &input.password {
        if !valid_password(password) {
            return Err(AppError::Validation(weak_password_message()));
        }
        set.insert("password", auth::hash_password(password)?);
    }
    if let Some(role) = input.role {
        set.insert("role", i32::from(role));
    }

    if set.is_empty() {
        return get_user(db, id).await;
    }
    set.insert("updated_at", DateTime::now());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    users
        .find_one_and_update(doc! {"_id": id}, doc! {"$set": set}, options)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Deletes the user and returns the removed document.
pub async fn delete_user(db: &Database, id: ObjectId) -> Result<User, AppError> {
    db::users(db)
        .find_one_and_delete(doc! {"_id": id}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Upserts one cart line, snapshotting the product's current price, name
/// and image. Idempotent on product id: an existing line is overwritten in
/// place, never duplicated.
pub async fn set_cart_line(
    db: &Database,
    user_id: ObjectId,
    product_id: ObjectId,
    quantity: Option<i32>,
) -> Result<(), AppError> {
    let quantity = quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be a positive number".to_string(),
        ));
    }

    let product = db::products(db)
        .find_one(doc! {"_id": product_id}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let users = db::users(db);
    let mut user = users
        .find_one(doc! {"_id": user_id}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let line = CartLine {
        product: product_id,
        quantity,
        price: product.price,
        name: product.name.clone(),
        image: product.image.clone(),
    };
    upsert_cart_line(&mut user.cart, line);

    // Find-then-save: per-document atomicity only, concurrent updates to
    // the same cart are last-write-wins.
    users
        .update_one(
            doc! {"_id": user_id},
            doc! {"$set": {"cart": to_bson(&user.cart)?, "updated_at": DateTime::now()}},
            None,
        )
        .await?;
    Ok(())
}

pub fn upsert_cart_line(cart: &mut Vec<CartLine>, line: CartLine) {
    match cart.iter_mut().find(|existing| existing.product == line.product) {
        Some(existing) => *existing = line,
        None => cart.push(line),
    }
}

pub async fn add_to_wishlist(
    db: &Database,
    user_id: ObjectId,
    product_id: ObjectId,
) -> Result<(), AppError> {
    if db::products(db)
        .find_one(doc! {"_id": product_id}, None)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    let result = db::users(db)
        .update_one(
            doc! {"_id": user_id},
            doc! {"$addToSet": {"wishlist": product_id}, "$set": {"updated_at": DateTime::now()}},
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn remove_from_wishlist(
    db: &Database,
    user_id: ObjectId,
    product_id: ObjectId,
) -> Result<(), AppError> {
    let result = db::users(db)
        .update_one(
            doc! {"_id": user_id},
            doc! {"$pull": {"wishlist": product_id}, "$set": {"updated_at": DateTime::now()}},
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Stores a hashed reset token with a 15-minute expiry and returns the raw
/// token for delivery to the account owner.
pub async fn forgot_password(db: &Database, email: &str) -> Result<String, AppError> {
    let users = db::users(db);
    let user = users
        .find_one(doc! {"email": email}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("No account with that email".to_string()))?;

    let (raw, digest) = auth::create_password_reset_token();
    let expires = DateTime::from_millis(DateTime::now().timestamp_millis() + RESET_TOKEN_TTL_MILLIS);
    users
        .update_one(
            doc! {"_id": user.id},
            doc! {"$set": {
                "password_reset_token": digest,
                "password_reset_expires": expires,
                "updated_at": DateTime::now(),
            }},
            None,
        )
        .await?;
    Ok(raw)
}

pub async fn reset_password(db: &Database, token: &str, password: &str) -> Result<(), AppError> {
    if !valid_password(password) {
        return Err(AppError::Validation(weak_password_message()));
    }

    let digest = auth::hash_reset_token(token);
    let users = db::users(db);
    let user = users
        .find_one(
            doc! {
                "password_reset_token": digest,
                "password_reset_expires": {"$gt": DateTime::now()},
            },
            None,
        )
        .await?
        .ok_or_else(|| {
            AppError::Validation("Reset token is invalid or has expired".to_string())
        })?;

    let hashed = auth::hash_password(password)?;
    users
        .update_one(
            doc! {"_id": user.id},
            doc! {
                "$set": {"password": hashed, "updated_at": DateTime::now()},
                "$unset": {"password_reset_token": "", "password_reset_expires": ""},
            },
            None,
        )
        .await?;
    Ok(())
}

fn validate_registration(input: &RegisterInput) -> Result<(), AppError> {
    if input.firstname.is_empty()
        || input.lastname.is_empty()
        || input.email.is_empty()
        || input.mobile.is_empty()
        || input.password.is_empty()
        || input.address.is_empty()
    {
        return Err(AppError::Validation(
            "All fields are required".to_string(),
        ));
    }
    if !valid_email(&input.email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    if !valid_password(&input.password) {
        return Err(AppError::Validation(weak_password_message()));
    }
    Ok(())
}

fn weak_password_message() -> String {
    "Password must be at least 8 characters and include a lowercase letter, \
     an uppercase letter and a special character"
        .to_string()
}

/// `local@domain.tld` with no whitespace anywhere.
fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() => match domain.rsplit_once('.') {
            Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
            None => false,
        },
        _ => false,
    }
}

/// At least 8 characters with a lowercase letter, an uppercase letter and a
/// special character (underscore does not count as special).
fn valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| !c.is_alphanumeric() && c != '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: ObjectId, quantity: i32, price: f64) -> CartLine {
        CartLine {
            product,
            quantity,
            price,
            name: "Widget".to_string(),
            image: "widget.png".to_string(),
        }
    }

    #[test]
    fn test_cart_upsert_is_idempotent_by_product() {
        let product = ObjectId::new();
        let mut cart = Vec::new();

        upsert_cart_line(&mut cart, line(product, 3, 10.0));
        upsert_cart_line(&mut cart, line(product, 3, 10.0));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 3);
    }

    #[test]
    fn test_cart_upsert_overwrites_quantity_and_snapshot() {
        let product = ObjectId::new();
        let mut cart = vec![line(product, 1, 10.0)];

        upsert_cart_line(&mut cart, line(product, 5, 12.5));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
        assert_eq!(cart[0].price, 12.5);
    }

    #[test]
    fn test_cart_upsert_appends_new_products() {
        let mut cart = vec![line(ObjectId::new(), 1, 10.0)];
        upsert_cart_line(&mut cart, line(ObjectId::new(), 2, 5.0));
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("nguyenvana@gmail.com"));
        assert!(valid_email("a.b@sub.domain.org"));
        assert!(!valid_email("plainaddress"));
        assert!(!valid_email("@nolocal.com"));
        assert!(!valid_email("no@tld"));
        assert!(!valid_email("spaces in@mail.com"));
        assert!(!valid_email("two@@signs.com"));
    }

    #[test]
    fn test_valid_password() {
        assert!(valid_password("Str0ng!password"));
        assert!(!valid_password("short!A"));
        assert!(!valid_password("alllowercase1!"));
        assert!(!valid_password("ALLUPPERCASE1!"));
        assert!(!valid_password("NoSpecial123"));
        // Underscore alone does not satisfy the special-character rule.
        assert!(!valid_password("With_Underscore1"));
    }
}
