use crate::domain::catalog::{ItemContext, ItemId, ResolvedItem, Restaurant, RestaurantId};
use crate::resolver::normalize::{normalize, strip_size, SizeHint};

/// Pre-normalized view over a bounded catalog slice. Matching walks the
/// entries in catalog order and the first hit wins; there is no ranking
/// beyond that, which keeps resolution deterministic at the cost of eager
/// matches on short phrases.
pub struct CatalogIndex {
    entries: Vec<IndexEntry>,
}

struct IndexEntry {
    item: ItemContext,
    name: String,
    variants: Vec<IndexedVariant>,
}

struct IndexedVariant {
    position: usize,
    name: String,
    alias: String,
}

impl CatalogIndex {
    pub fn new(items: Vec<ItemContext>) -> Self {
        let entries = items
            .into_iter()
            .map(|item| {
                let name = normalize(&item.name);
                let variants = item
                    .variants
                    .iter()
                    .enumerate()
                    .map(|(position, variant)| {
                        let variant_name = normalize(&variant.name);
                        IndexedVariant {
                            position,
                            alias: format!("{name} {variant_name}"),
                            name: variant_name,
                        }
                    })
                    .collect();
                IndexEntry { name, variants, item }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemContext> {
        self.entries.iter().map(|entry| &entry.item)
    }

    /// Resolves a customer phrase to an item and, when determinable, a
    /// variant. `size_override` takes precedence over a size word found in
    /// the phrase. Returns `None` when nothing in the slice matches or the
    /// phrase reduces to a bare size word.
    pub fn resolve(&self, phrase: &str, size_override: Option<SizeHint>) -> Option<ResolvedItem> {
        let (needle, captured) = strip_size(phrase);
        if needle.is_empty() {
            return None;
        }
        let size = size_override.or(captured);

        let entry = self.find_entry(&needle)?;
        match entry {
            Found::Item(entry) => Some(self.build(entry, self.pick_variant(entry, size))),
            Found::ItemVariant(entry, position) => Some(self.build(entry, Some(position))),
        }
    }

    /// Re-resolves a known item against a new size. Used when a bare size
    /// word arrives right after an add ("كبيرة" meaning the last item).
    pub fn resolve_size_for_item(&self, item_id: ItemId, size: SizeHint) -> Option<ResolvedItem> {
        let entry = self.entries.iter().find(|entry| entry.item.item_id == item_id)?;
        let position = self.pick_variant(entry, Some(size))?;
        Some(self.build(entry, Some(position)))
    }

    /// Near-miss suggestions for the "did you mean" reply: entries sharing
    /// at least one word with the phrase, best overlap first, catalog order
    /// within equal overlap.
    pub fn candidates(&self, phrase: &str, limit: usize) -> Vec<ResolvedItem> {
        let (needle, _) = strip_size(phrase);
        let words: Vec<&str> = needle.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let overlap = words.iter().filter(|word| entry.name.contains(**word)).count();
                (overlap > 0).then_some((overlap, position))
            })
            .collect();
        scored.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));

        scored
            .into_iter()
            .take(limit)
            .map(|(_, position)| {
                let entry = &self.entries[position];
                self.build(entry, None)
            })
            .collect()
    }

    fn find_entry(&self, needle: &str) -> Option<Found<'_>> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.name == needle) {
            return Some(Found::Item(entry));
        }
        for entry in &self.entries {
            if let Some(variant) = entry.variants.iter().find(|variant| variant.alias == needle) {
                return Some(Found::ItemVariant(entry, variant.position));
            }
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.name.contains(needle)) {
            return Some(Found::Item(entry));
        }
        for entry in &self.entries {
            if let Some(variant) =
                entry.variants.iter().find(|variant| variant.alias.contains(needle))
            {
                return Some(Found::ItemVariant(entry, variant.position));
            }
        }
        self.entries.iter().find(|entry| needle.contains(&entry.name)).map(Found::Item)
    }

    fn pick_variant(&self, entry: &IndexEntry, size: Option<SizeHint>) -> Option<usize> {
        let size = size?;
        entry
            .variants
            .iter()
            .find(|variant| {
                size.synonyms().iter().any(|synonym| variant.name.contains(synonym))
            })
            .map(|variant| variant.position)
    }

    fn build(&self, entry: &IndexEntry, variant_position: Option<usize>) -> ResolvedItem {
        let item = &entry.item;
        match variant_position.and_then(|position| item.variants.get(position)) {
            Some(variant) => ResolvedItem {
                item_id: item.item_id,
                variant_id: Some(variant.id),
                name: format!("{} ({})", item.name, variant.name),
                price: Some(variant.price),
                restaurant_id: item.restaurant_id,
                restaurant_name: item.restaurant_name.clone(),
            },
            None => ResolvedItem {
                item_id: item.item_id,
                variant_id: None,
                name: item.name.clone(),
                price: item.price,
                restaurant_id: item.restaurant_id,
                restaurant_name: item.restaurant_name.clone(),
            },
        }
    }
}

enum Found<'a> {
    Item(&'a IndexEntry),
    ItemVariant(&'a IndexEntry, usize),
}

/// Matches a restaurant mention against the active restaurants with the
/// same normalization as item matching. First hit in list order wins.
pub fn resolve_restaurant(phrase: &str, restaurants: &[Restaurant]) -> Option<RestaurantId> {
    let needle = normalize(phrase);
    if needle.is_empty() {
        return None;
    }

    if let Some(found) =
        restaurants.iter().find(|restaurant| normalize(&restaurant.name) == needle)
    {
        return Some(found.id);
    }
    restaurants
        .iter()
        .find(|restaurant| {
            let name = normalize(&restaurant.name);
            name.contains(&needle) || needle.contains(&name)
        })
        .map(|restaurant| restaurant.id)
}
