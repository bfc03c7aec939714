use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantCategoryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuCategoryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantId(pub i64);

/// Cuisine grouping shown on the first browse screen (grills, pizza, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantCategory {
    pub id: RestaurantCategoryId,
    pub name: String,
    pub position: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub category_id: RestaurantCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub delivery_fee: Decimal,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub id: MenuCategoryId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub position: i64,
}

/// `price` is `None` when the item is priced through its variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: ItemId,
    pub restaurant_id: RestaurantId,
    pub category_id: MenuCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub available: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemVariant {
    pub id: VariantId,
    pub item_id: ItemId,
    pub name: String,
    pub price: Decimal,
}

/// Listing row for a menu page: `price_from` is the item price or the
/// cheapest variant price, `None` when neither is set yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub price_from: Option<Decimal>,
    pub has_variants: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item: MenuItem,
    pub variants: Vec<ItemVariant>,
}

/// One item of the bounded catalog slice handed to the language model and
/// the resolver. Carries enough to match, price, and attribute a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    pub item_id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub variants: Vec<ItemVariant>,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
}

/// Outcome of catalog resolution. `price` stays `None` when the item is
/// priced by variants and none was selected; such an item must not enter
/// the cart until a variant is chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item_id: ItemId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub price: Option<Decimal>,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
}

impl ItemDetails {
    pub fn price_from(&self) -> Option<Decimal> {
        self.item.price.or_else(|| self.variants.iter().map(|variant| variant.price).min())
    }
}
