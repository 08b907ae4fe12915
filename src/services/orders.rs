use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;

use crate::db;
use crate::error::AppError;
use crate::models::{CartLine, Order, OrderLine, OrderStatus};

/// Converts the caller's cart into an immutable order and empties the cart.
///
/// Line items are copied from the cart-line snapshots; the price captured
/// at cart-update time is authoritative even if the product has changed
/// since. The order insert and the cart clear are two separate document
/// writes: a crash between them leaves the order persisted with the cart
/// intact, so retrying can create the order again (at-least-once).
pub async fn create_order(
    db: &Database,
    user_id: ObjectId,
    address: &str,
    status: Option<OrderStatus>,
) -> Result<Order, AppError> {
    if address.trim().is_empty() {
        return Err(AppError::Validation(
            "Delivery address is required".to_string(),
        ));
    }

    let users = db::users(db);
    let user = users
        .find_one(doc! {"_id": user_id}, None)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.cart.is_empty() {
        return Err(AppError::Validation("Cart is empty".to_string()));
    }

    let lines = build_order_lines(&user.cart);
    let total = order_total(&lines);
    let mut order = Order::new(
        user_id,
        address.trim().to_string(),
        lines,
        total,
        status.unwrap_or_default(),
    );

    let result = db::orders(db).insert_one(&order, None).await?;
    order.id = result.inserted_id.as_object_id();

    users
        .update_one(
            doc! {"_id": user_id},
            doc! {"$set": {"cart": [], "updated_at": DateTime::now()}},
            None,
        )
        .await?;

    Ok(order)
}

pub async fn list_orders(db: &Database) -> Result<Vec<Order>, AppError> {
    let mut cursor = db::orders(db).find(None, None).await?;
    let mut orders = vec![];
    while let Some(order) = cursor.next().await {
        orders.push(order?);
    }
    Ok(orders)
}

pub async fn find_order(db: &Database, id: ObjectId) -> Result<Option<Order>, AppError> {
    Ok(db::orders(db).find_one(doc! {"_id": id}, None).await?)
}

pub fn build_order_lines(cart: &[CartLine]) -> Vec<OrderLine> {
    cart.iter()
        .map(|line| OrderLine {
            product: line.product,
            quantity: line.quantity,
            price: line.price,
            name: line.name.clone(),
            image: line.image.clone(),
        })
        .collect()
}

pub fn order_total(lines: &[OrderLine]) -> f64 {
    lines
        .iter()
        .map(|line| line.price * f64::from(line.quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_line(quantity: i32, price: f64) -> CartLine {
        CartLine {
            product: ObjectId::new(),
            quantity,
            price,
            name: "Widget".to_string(),
            image: "widget.png".to_string(),
        }
    }

    #[test]
    fn test_order_total_sums_price_times_quantity() {
        let cart = vec![cart_line(2, 10.0), cart_line(1, 5.0)];
        let lines = build_order_lines(&cart);
        assert_eq!(lines.len(), 2);
        assert_eq!(order_total(&lines), 25.0);
    }

    #[test]
    fn test_order_total_of_no_lines_is_zero() {
        assert_eq!(order_total(&[]), 0.0);
    }

    #[test]
    fn test_order_lines_freeze_the_cart_snapshot() {
        let cart = vec![cart_line(3, 19.99)];
        let lines = build_order_lines(&cart);
        // The order line repeats the snapshot, not the live product.
        assert_eq!(lines[0].product, cart[0].product);
        assert_eq!(lines[0].price, 19.99);
        assert_eq!(lines[0].name, "Widget");
        assert_eq!(lines[0].image, "widget.png");
    }

    #[test]
    fn test_order_defaults_to_successful() {
        let order = Order::new(
            ObjectId::new(),
            "1 Main St".to_string(),
            build_order_lines(&[cart_line(1, 1.0)]),
            1.0,
            OrderStatus::default(),
        );
        assert_eq!(order.status, OrderStatus::Successful);
        assert_eq!(order.total, 1.0);
    }
}
