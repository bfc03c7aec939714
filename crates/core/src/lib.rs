pub mod cart;
pub mod choice;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod resolver;

pub use cart::{Cart, CartKey, CartLine, MAX_LINE_QUANTITY};
pub use choice::{page_slice, ChoiceId, Paged, PAGE_SIZE};
pub use domain::catalog::{
    ItemContext, ItemDetails, ItemId, ItemSummary, ItemVariant, MenuCategory, MenuCategoryId,
    MenuItem, ResolvedItem, Restaurant, RestaurantCategory, RestaurantCategoryId, RestaurantId,
    VariantId,
};
pub use domain::customer::{CustomerId, CustomerProfile};
pub use domain::order::{
    DeliveryAddress, DraftOrder, NewOrder, NewOrderLine, Order, OrderId, OrderStatus,
};
pub use domain::session::{ConversationState, HistoryTurn, Language, Session, TurnRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{Intent, IntentItem, IntentKind, ItemAction, MAX_INTENT_ITEMS};
pub use resolver::{normalize, resolve_restaurant, strip_size, CatalogIndex, SizeHint};
