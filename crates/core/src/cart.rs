use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ItemId, ResolvedItem, RestaurantId, VariantId};
use crate::errors::DomainError;

pub const MAX_LINE_QUANTITY: u32 = 99;

/// Merge identity of a cart line. The same item in two sizes is two lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub item_id: ItemId,
    pub variant_id: Option<VariantId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub variant_id: Option<VariantId>,
    pub display_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub restaurant_id: RestaurantId,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey { item_id: self.item_id, variant_id: self.variant_id }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Lines in insertion order. Totals are always derived from the lines,
/// never cached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines.
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn get(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.key() == *key)
    }

    /// First line for the item regardless of variant, in insertion order.
    pub fn key_for_item(&self, item_id: ItemId) -> Option<CartKey> {
        self.lines.iter().find(|line| line.item_id == item_id).map(CartLine::key)
    }

    pub fn first_restaurant(&self) -> Option<RestaurantId> {
        self.lines.first().map(|line| line.restaurant_id)
    }

    pub fn mixed_restaurants(&self) -> bool {
        match self.first_restaurant() {
            Some(first) => self.lines.iter().any(|line| line.restaurant_id != first),
            None => false,
        }
    }

    /// Adds the resolved item, merging quantities when the (item, variant)
    /// key is already present. Items without a settled price are rejected.
    pub fn add(&mut self, item: &ResolvedItem, quantity: u32) -> Result<CartKey, DomainError> {
        let unit_price = item
            .price
            .ok_or_else(|| DomainError::UnpricedItem { name: item.name.clone() })?;
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::QuantityOutOfRange {
                quantity: i64::from(quantity),
                max: MAX_LINE_QUANTITY,
            });
        }

        let key = CartKey { item_id: item.item_id, variant_id: item.variant_id };
        if let Some(line) = self.lines.iter_mut().find(|line| line.key() == key) {
            line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
            return Ok(key);
        }

        self.lines.push(CartLine {
            item_id: item.item_id,
            variant_id: item.variant_id,
            display_name: item.name.clone(),
            unit_price,
            quantity,
            restaurant_id: item.restaurant_id,
        });
        Ok(key)
    }

    /// Zero or negative removes the line. A missing line is a no-op so a
    /// replayed edit button never fails the turn.
    pub fn set_quantity(&mut self, key: &CartKey, quantity: i64) -> Result<bool, DomainError> {
        if quantity <= 0 {
            return Ok(self.remove(key));
        }
        if quantity > i64::from(MAX_LINE_QUANTITY) {
            return Err(DomainError::QuantityOutOfRange { quantity, max: MAX_LINE_QUANTITY });
        }

        match self.lines.iter_mut().find(|line| line.key() == *key) {
            Some(line) => {
                line.quantity = quantity as u32;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn increment(&mut self, key: &CartKey) -> bool {
        match self.lines.iter_mut().find(|line| line.key() == *key) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    pub fn decrement(&mut self, key: &CartKey) -> bool {
        let Some(line) = self.lines.iter_mut().find(|line| line.key() == *key) else {
            return false;
        };
        if line.quantity <= 1 {
            return self.remove(key);
        }
        line.quantity -= 1;
        true
    }

    pub fn remove(&mut self, key: &CartKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.key() != *key);
        self.lines.len() != before
    }

    /// Removes the first line carrying the item, whichever variant.
    pub fn remove_item(&mut self, item_id: ItemId) -> bool {
        match self.key_for_item(item_id) {
            Some(key) => self.remove(&key),
            None => false,
        }
    }

    /// Swaps the line at `old` for `item`, keeping the quantity. Fails
    /// without touching the cart when the line is missing or the new item
    /// has no settled price. Merges when the target key already exists.
    pub fn replace(&mut self, old: &CartKey, item: &ResolvedItem) -> Result<CartKey, DomainError> {
        if item.price.is_none() {
            return Err(DomainError::UnpricedItem { name: item.name.clone() });
        }
        let quantity = self.get(old).map(|line| line.quantity).ok_or(DomainError::LineNotFound)?;

        self.remove(old);
        self.add(item, quantity)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
