use crate::domain::catalog::{ItemId, MenuCategoryId, RestaurantCategoryId, RestaurantId, VariantId};
use crate::domain::order::OrderId;

/// Rows per listing page. Pages are zero-based in the wire ids; the first
/// page of a listing goes out without a page suffix.
pub const PAGE_SIZE: usize = 8;

/// Decoded structured-choice id. The wire form is
/// `<action>_<param>[_<param2>]` with numeric params, plus a closed set of
/// bare action names. Anything else fails decoding and is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceId {
    LangAr,
    LangEn,
    ChangeLanguage,
    OrderFood,
    MainMenu,
    ViewCart,
    Checkout,
    Support,
    EndSupport,
    AllRestaurants,
    AllRestaurantsPage { page: u32 },
    RestaurantCategory { category_id: RestaurantCategoryId },
    RestaurantCategoryPage { category_id: RestaurantCategoryId, page: u32 },
    Restaurant { restaurant_id: RestaurantId },
    MenuCategory { category_id: MenuCategoryId },
    MenuCategoryPage { category_id: MenuCategoryId, page: u32 },
    Item { item_id: ItemId },
    Variant { item_id: ItemId, variant_id: VariantId },
    Quantity { item_id: ItemId, quantity: u32 },
    EditCart,
    CartClear,
    CartIncrement { item_id: ItemId, variant_id: Option<VariantId> },
    CartDecrement { item_id: ItemId, variant_id: Option<VariantId> },
    CartRemove { item_id: ItemId, variant_id: Option<VariantId> },
    ConfirmOrder,
    ModifyOrder,
    CancelOrder,
    NewOrder,
    RateOrder { order_id: OrderId },
}

impl ChoiceId {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim();

        let bare = match value {
            "lang_ar" => Some(Self::LangAr),
            "lang_en" => Some(Self::LangEn),
            "change_lang" => Some(Self::ChangeLanguage),
            "order_food" => Some(Self::OrderFood),
            "main_menu" => Some(Self::MainMenu),
            "view_cart" => Some(Self::ViewCart),
            "checkout" => Some(Self::Checkout),
            "support" => Some(Self::Support),
            "end_support" => Some(Self::EndSupport),
            "all_rest" => Some(Self::AllRestaurants),
            "edit_cart" => Some(Self::EditCart),
            "cart_clear" => Some(Self::CartClear),
            "confirm_order" => Some(Self::ConfirmOrder),
            "modify_order" => Some(Self::ModifyOrder),
            "cancel_order" => Some(Self::CancelOrder),
            "new_order" => Some(Self::NewOrder),
            _ => None,
        };
        if bare.is_some() {
            return bare;
        }

        // Longest prefixes first so `rest_cat_page_` never lands in `rest_`.
        if let Some(rest) = value.strip_prefix("rest_cat_page_") {
            let (id, page) = parse_id_page(rest)?;
            return Some(Self::RestaurantCategoryPage {
                category_id: RestaurantCategoryId(id),
                page,
            });
        }
        if let Some(rest) = value.strip_prefix("rest_cat_") {
            return Some(Self::RestaurantCategory { category_id: RestaurantCategoryId(parse_id(rest)?) });
        }
        if let Some(rest) = value.strip_prefix("all_rest_page_") {
            return Some(Self::AllRestaurantsPage { page: parse_page(rest)? });
        }
        if let Some(rest) = value.strip_prefix("menu_cat_page_") {
            let (id, page) = parse_id_page(rest)?;
            return Some(Self::MenuCategoryPage { category_id: MenuCategoryId(id), page });
        }
        if let Some(rest) = value.strip_prefix("menu_cat_") {
            return Some(Self::MenuCategory { category_id: MenuCategoryId(parse_id(rest)?) });
        }
        if let Some(rest) = value.strip_prefix("rest_") {
            return Some(Self::Restaurant { restaurant_id: RestaurantId(parse_id(rest)?) });
        }
        if let Some(rest) = value.strip_prefix("item_") {
            return Some(Self::Item { item_id: ItemId(parse_id(rest)?) });
        }
        if let Some(rest) = value.strip_prefix("variant_") {
            let (item, variant) = parse_id_pair(rest)?;
            return Some(Self::Variant { item_id: ItemId(item), variant_id: VariantId(variant) });
        }
        if let Some(rest) = value.strip_prefix("qty_") {
            let (item, quantity) = parse_id_page(rest)?;
            if quantity == 0 {
                return None;
            }
            return Some(Self::Quantity { item_id: ItemId(item), quantity });
        }
        if let Some(rest) = value.strip_prefix("cart_inc_") {
            let (item, variant) = parse_id_maybe_pair(rest)?;
            return Some(Self::CartIncrement {
                item_id: ItemId(item),
                variant_id: variant.map(VariantId),
            });
        }
        if let Some(rest) = value.strip_prefix("cart_dec_") {
            let (item, variant) = parse_id_maybe_pair(rest)?;
            return Some(Self::CartDecrement {
                item_id: ItemId(item),
                variant_id: variant.map(VariantId),
            });
        }
        if let Some(rest) = value.strip_prefix("cart_rm_") {
            let (item, variant) = parse_id_maybe_pair(rest)?;
            return Some(Self::CartRemove {
                item_id: ItemId(item),
                variant_id: variant.map(VariantId),
            });
        }
        if let Some(rest) = value.strip_prefix("rate_order_") {
            return Some(Self::RateOrder { order_id: OrderId(parse_id(rest)?) });
        }

        None
    }

    pub fn as_id(&self) -> String {
        match self {
            Self::LangAr => "lang_ar".to_string(),
            Self::LangEn => "lang_en".to_string(),
            Self::ChangeLanguage => "change_lang".to_string(),
            Self::OrderFood => "order_food".to_string(),
            Self::MainMenu => "main_menu".to_string(),
            Self::ViewCart => "view_cart".to_string(),
            Self::Checkout => "checkout".to_string(),
            Self::Support => "support".to_string(),
            Self::EndSupport => "end_support".to_string(),
            Self::AllRestaurants => "all_rest".to_string(),
            Self::AllRestaurantsPage { page } => format!("all_rest_page_{page}"),
            Self::RestaurantCategory { category_id } => format!("rest_cat_{}", category_id.0),
            Self::RestaurantCategoryPage { category_id, page } => {
                format!("rest_cat_page_{}_{page}", category_id.0)
            }
            Self::Restaurant { restaurant_id } => format!("rest_{}", restaurant_id.0),
            Self::MenuCategory { category_id } => format!("menu_cat_{}", category_id.0),
            Self::MenuCategoryPage { category_id, page } => {
                format!("menu_cat_page_{}_{page}", category_id.0)
            }
            Self::Item { item_id } => format!("item_{}", item_id.0),
            Self::Variant { item_id, variant_id } => {
                format!("variant_{}_{}", item_id.0, variant_id.0)
            }
            Self::Quantity { item_id, quantity } => format!("qty_{}_{quantity}", item_id.0),
            Self::EditCart => "edit_cart".to_string(),
            Self::CartClear => "cart_clear".to_string(),
            Self::CartIncrement { item_id, variant_id } => {
                cart_edit_id("cart_inc", *item_id, *variant_id)
            }
            Self::CartDecrement { item_id, variant_id } => {
                cart_edit_id("cart_dec", *item_id, *variant_id)
            }
            Self::CartRemove { item_id, variant_id } => {
                cart_edit_id("cart_rm", *item_id, *variant_id)
            }
            Self::ConfirmOrder => "confirm_order".to_string(),
            Self::ModifyOrder => "modify_order".to_string(),
            Self::CancelOrder => "cancel_order".to_string(),
            Self::NewOrder => "new_order".to_string(),
            Self::RateOrder { order_id } => format!("rate_order_{}", order_id.0),
        }
    }
}

fn cart_edit_id(action: &str, item_id: ItemId, variant_id: Option<VariantId>) -> String {
    match variant_id {
        Some(variant) => format!("{action}_{}_{}", item_id.0, variant.0),
        None => format!("{action}_{}", item_id.0),
    }
}

fn parse_id(token: &str) -> Option<i64> {
    if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    token.parse::<i64>().ok().filter(|id| *id > 0)
}

fn parse_page(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    token.parse::<u32>().ok()
}

fn parse_id_pair(rest: &str) -> Option<(i64, i64)> {
    let (first, second) = rest.split_once('_')?;
    Some((parse_id(first)?, parse_id(second)?))
}

fn parse_id_page(rest: &str) -> Option<(i64, u32)> {
    let (first, second) = rest.split_once('_')?;
    Some((parse_id(first)?, parse_page(second)?))
}

fn parse_id_maybe_pair(rest: &str) -> Option<(i64, Option<i64>)> {
    match rest.split_once('_') {
        Some((first, second)) => Some((parse_id(first)?, Some(parse_id(second)?))),
        None => Some((parse_id(rest)?, None)),
    }
}

/// Window of a listing snapshot. `has_next` drives the only "more" row a
/// page may carry; the last page carries none.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paged {
    pub start: usize,
    pub end: usize,
    pub page: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

pub fn page_slice(total: usize, page: u32) -> Paged {
    let start = (page as usize).saturating_mul(PAGE_SIZE).min(total);
    let end = start.saturating_add(PAGE_SIZE).min(total);
    Paged { start, end, page, has_prev: page > 0, has_next: end < total }
}
