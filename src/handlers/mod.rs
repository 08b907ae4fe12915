pub mod catalog;
pub mod orders;
pub mod users;

use mongodb::bson::oid::ObjectId;

use crate::error::AppError;

pub fn parse_object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
        assert!(parse_object_id("nonsense").is_err());
    }
}
