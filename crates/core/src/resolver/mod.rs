pub mod matcher;
pub mod normalize;

pub use matcher::{resolve_restaurant, CatalogIndex};
pub use normalize::{normalize, strip_size, SizeHint};
