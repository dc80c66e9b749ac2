use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use std::collections::HashSet;

/// Catalog data handed to `add_to_cart`; carries no quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub price: f64,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            image_url: image_url.into(),
            price,
        }
    }
}

/// One entry of the cart. `quantity` is never 0 while the item is in a `Cart`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub title: String,
    #[serde(alias = "image_url")]
    pub image_url: String,
    pub price: f64,
    pub quantity: u32,
}

impl LineItem {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            image_url: product.image_url.clone(),
            price: product.price,
            quantity: 1,
        }
    }
}

/// What a single mutation did to the cart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartChange {
    Added { id: String },
    QuantityChanged { id: String, quantity: u32 },
    Removed { id: String },
}

impl CartChange {
    pub fn id(&self) -> &str {
        match self {
            CartChange::Added { id }
            | CartChange::QuantityChanged { id, .. }
            | CartChange::Removed { id } => id,
        }
    }
}

/// Ordered, id-unique collection of line items.
///
/// Mutations never touch `self`; they return a fresh `Cart` so snapshots
/// already handed out stay valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from stored items, rejecting duplicate ids and zero quantities.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(Error::InvalidRecord(format!(
                    "item '{}' has quantity 0",
                    item.id
                )));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(Error::InvalidRecord(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines (badge count, not a price total).
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Append `product` with quantity 1, or bump it if the id is already present.
    pub fn with_product(&self, product: &Product) -> (Cart, CartChange) {
        if let Ok(bumped) = self.incremented(&product.id) {
            return bumped;
        }

        let mut items = self.items.clone();
        items.push(LineItem::from_product(product));
        (
            Cart { items },
            CartChange::Added {
                id: product.id.clone(),
            },
        )
    }

    pub fn incremented(&self, id: &str) -> Result<(Cart, CartChange)> {
        let index = self.require(id)?;
        let mut items = self.items.clone();
        let item = &mut items[index];
        item.quantity = item.quantity.saturating_add(1);
        let change = CartChange::QuantityChanged {
            id: id.to_string(),
            quantity: item.quantity,
        };
        Ok((Cart { items }, change))
    }

    /// Lower the quantity by one; a line at quantity 1 is removed instead.
    pub fn decremented(&self, id: &str) -> Result<(Cart, CartChange)> {
        let index = self.require(id)?;
        let mut items = self.items.clone();

        if items[index].quantity > 1 {
            let item = &mut items[index];
            item.quantity -= 1;
            let change = CartChange::QuantityChanged {
                id: id.to_string(),
                quantity: item.quantity,
            };
            Ok((Cart { items }, change))
        } else {
            items.remove(index);
            Ok((Cart { items }, CartChange::Removed { id: id.to_string() }))
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> Product {
        Product::new("1", "Shirt", "u", 10.0)
    }

    fn cart_of(entries: &[(&str, u32)]) -> Cart {
        let items = entries
            .iter()
            .map(|(id, quantity)| LineItem {
                id: id.to_string(),
                title: format!("Product {id}"),
                image_url: format!("https://img/{id}.png"),
                price: 5.0,
                quantity: *quantity,
            })
            .collect();
        Cart::from_items(items).unwrap()
    }

    fn quantities(cart: &Cart) -> Vec<(String, u32)> {
        cart.iter().map(|i| (i.id.clone(), i.quantity)).collect()
    }

    #[test]
    fn test_add_to_empty_cart() {
        let (cart, change) = Cart::new().with_product(&shirt());

        assert_eq!(cart.len(), 1);
        let item = cart.get("1").unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.title, "Shirt");
        assert_eq!(item.image_url, "u");
        assert_eq!(item.price, 10.0);
        assert_eq!(change, CartChange::Added { id: "1".into() });
    }

    #[test]
    fn test_add_existing_bumps_quantity() {
        let (cart, _) = Cart::new().with_product(&shirt());
        let (cart, change) = cart.with_product(&shirt());

        assert_eq!(quantities(&cart), vec![("1".to_string(), 2)]);
        assert_eq!(
            change,
            CartChange::QuantityChanged {
                id: "1".into(),
                quantity: 2
            }
        );
    }

    #[test]
    fn test_add_existing_matches_increment() {
        let start = cart_of(&[("1", 1), ("2", 3)]);
        let product = Product::new("2", "Product 2", "https://img/2.png", 5.0);

        let (via_add, add_change) = start.with_product(&product);
        let (via_increment, inc_change) = start.incremented("2").unwrap();

        assert_eq!(via_add, via_increment);
        assert_eq!(add_change, inc_change);
    }

    #[test]
    fn test_add_keeps_ids_unique() {
        let mut cart = Cart::new();
        for id in ["a", "b", "a", "c", "b", "a"] {
            cart = cart.with_product(&Product::new(id, id, "", 1.0)).0;
        }

        assert_eq!(
            quantities(&cart),
            vec![
                ("a".to_string(), 3),
                ("b".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn test_decrement_to_zero_removes() {
        let cart = cart_of(&[("1", 2)]);

        let (cart, change) = cart.decremented("1").unwrap();
        assert_eq!(quantities(&cart), vec![("1".to_string(), 1)]);
        assert_eq!(
            change,
            CartChange::QuantityChanged {
                id: "1".into(),
                quantity: 1
            }
        );

        let (cart, change) = cart.decremented("1").unwrap();
        assert!(cart.is_empty());
        assert_eq!(change, CartChange::Removed { id: "1".into() });
    }

    #[test]
    fn test_increment_leaves_others_in_order() {
        let cart = cart_of(&[("1", 1), ("2", 1)]);

        let (cart, _) = cart.incremented("2").unwrap();

        assert_eq!(
            quantities(&cart),
            vec![("1".to_string(), 1), ("2".to_string(), 2)]
        );
    }

    #[test]
    fn test_remove_preserves_order_of_rest() {
        let cart = cart_of(&[("1", 1), ("2", 1), ("3", 4)]);

        let (cart, _) = cart.decremented("2").unwrap();

        assert_eq!(
            quantities(&cart),
            vec![("1".to_string(), 1), ("3".to_string(), 4)]
        );
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let cart = cart_of(&[("1", 1)]);

        assert_eq!(
            cart.incremented("nope").unwrap_err(),
            Error::NotFound("nope".into())
        );
        assert_eq!(
            cart.decremented("nope").unwrap_err(),
            Error::NotFound("nope".into())
        );
        // Untouched
        assert_eq!(quantities(&cart), vec![("1".to_string(), 1)]);
    }

    #[test]
    fn test_snapshots_are_not_aliased() {
        let before = cart_of(&[("1", 1)]);
        let (after, _) = before.incremented("1").unwrap();

        assert_eq!(before.get("1").unwrap().quantity, 1);
        assert_eq!(after.get("1").unwrap().quantity, 2);
    }

    #[test]
    fn test_quantity_never_reaches_zero() {
        let mut cart = cart_of(&[("1", 3), ("2", 1)]);
        for id in ["1", "2", "1", "1"] {
            cart = cart.decremented(id).unwrap().0;
            assert!(cart.iter().all(|item| item.quantity >= 1));
        }
        assert!(cart.is_empty());
    }

    #[test]
    fn test_from_items_rejects_invariant_violations() {
        let item = LineItem::from_product(&shirt());

        let duplicate = Cart::from_items(vec![item.clone(), item.clone()]);
        assert!(matches!(duplicate, Err(Error::InvalidRecord(_))));

        let zero = Cart::from_items(vec![LineItem {
            quantity: 0,
            ..item
        }]);
        assert!(matches!(zero, Err(Error::InvalidRecord(_))));
    }
}
