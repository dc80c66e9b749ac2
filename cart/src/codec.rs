//! Text encoding of the persisted cart record.
//!
//! The record is a JSON array of line items using the keys `id`, `title`,
//! `imageUrl`, `price` and `quantity`. Older clients wrote `image_url`, which is
//! still accepted on read.

use crate::domain::{Cart, LineItem};
use shared::{Error, Result};

/// Fails on a non-finite price: JSON has no NaN or infinity, and the record
/// would otherwise be written with `null` in its place and fail to decode.
pub fn encode(cart: &Cart) -> Result<String> {
    if let Some(item) = cart.iter().find(|item| !item.price.is_finite()) {
        return Err(Error::Serialization(format!(
            "Item '{}' has a non-finite price: {}",
            item.id, item.price
        )));
    }
    serde_json::to_string(cart)
        .map_err(|e| Error::Serialization(format!("Failed to serialize cart: {}", e)))
}

pub fn decode(raw: &str) -> Result<Cart> {
    let items: Vec<LineItem> = serde_json::from_str(raw)
        .map_err(|e| Error::Serialization(format!("Failed to deserialize cart: {}", e)))?;
    Cart::from_items(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;

    #[test]
    fn test_round_trip_preserves_items_and_order() {
        let (cart, _) = Cart::new().with_product(&Product::new("b", "Mug", "https://img/b", 7.5));
        let (cart, _) = cart.with_product(&Product::new("a", "Cap", "https://img/a", 12.0));
        let (cart, _) = cart.with_product(&Product::new("b", "Mug", "https://img/b", 7.5));

        let raw = encode(&cart).unwrap();
        let decoded = decode(&raw).unwrap();

        assert_eq!(decoded, cart);
        assert_eq!(decoded.items()[0].id, "b");
        assert_eq!(decoded.items()[0].quantity, 2);
        assert_eq!(decoded.items()[1].id, "a");
    }

    #[test]
    fn test_encoded_field_names() {
        let (cart, _) = Cart::new().with_product(&Product::new("1", "Shirt", "u", 10.0));

        let raw = encode(&cart).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(
            value,
            serde_json::json!([
                {"id": "1", "title": "Shirt", "imageUrl": "u", "price": 10.0, "quantity": 1}
            ])
        );
    }

    #[test]
    fn test_empty_cart_encodes_as_empty_array() {
        assert_eq!(encode(&Cart::new()).unwrap(), "[]");
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_accepts_legacy_image_url_key() {
        let raw = r#"[{"id":"9","title":"Lamp","image_url":"https://img/9","price":49.9,"quantity":3}]"#;

        let cart = decode(raw).unwrap();

        let item = cart.get("9").unwrap();
        assert_eq!(item.image_url, "https://img/9");
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_encode_rejects_non_finite_price() {
        for price in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (cart, _) = Cart::new().with_product(&Product::new("1", "Shirt", "u", 10.0));
            let (cart, _) = cart.with_product(&Product::new("2", "Mug", "u", price));

            let result = encode(&cart);

            assert!(
                matches!(&result, Err(Error::Serialization(msg)) if msg.contains("'2'")),
                "price {price} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_decode_rejects_malformed_records() {
        assert!(matches!(decode("not json"), Err(Error::Serialization(_))));
        assert!(matches!(decode(r#"{"id":"1"}"#), Err(Error::Serialization(_))));
        assert!(matches!(
            decode(r#"[{"id":"1","title":"t","imageUrl":"u","price":1,"quantity":-1}]"#),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            decode(r#"[{"id":"1","title":"t","imageUrl":"u","price":1,"quantity":0}]"#),
            Err(Error::InvalidRecord(_))
        ));
    }
}
