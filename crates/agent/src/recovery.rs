use std::collections::HashSet;

use sofra_core::{
    normalize, strip_size, Intent, IntentItem, IntentKind, ItemContext, SizeHint,
    MAX_LINE_QUANTITY,
};

const MAX_RECOVERED_ITEMS: usize = 5;
const MIN_OVERLAP_WORD_CHARS: usize = 3;

/// Deterministic keyword scan used when the language model fails. Works on
/// the same bounded catalog slice the model saw, so a recovered item is
/// always resolvable downstream.
#[derive(Clone, Debug, Default)]
pub struct RecoveryExtractor;

impl RecoveryExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Returns an order intent when the text names at least one catalog
    /// item, `None` when there is nothing to salvage. Quantity and size
    /// attach only when exactly one item matched; spreading them over
    /// several mentions guesses too much.
    pub fn recover(&self, text: &str, catalog: &[ItemContext]) -> Option<Intent> {
        let (stripped, size) = strip_size(text);
        if stripped.is_empty() || catalog.is_empty() {
            return None;
        }

        let vocabulary = catalog_vocabulary(catalog);
        let (needle, dual_quantity) = expand_duals(&stripped, &vocabulary);
        let quantity = extract_quantity(&needle).or(dual_quantity);

        let names = match_items(&needle, catalog);
        if names.is_empty() {
            return None;
        }

        let single = names.len() == 1;
        let items = names
            .into_iter()
            .map(|name| IntentItem {
                name,
                quantity: if single { quantity } else { None },
                size: if single { size.map(|hint| size_word(hint).to_string()) } else { None },
                action: None,
            })
            .collect();

        Some(Intent {
            kind: IntentKind::Order,
            items,
            restaurant_name: None,
            delivery_address: None,
            reference_position: None,
            upsell_suggestions: Vec::new(),
            message: None,
        })
    }
}

/// Full normalized item names contained in the text win, in catalog order.
/// Only when none matches does a single word-overlap hit stand in.
fn match_items(needle: &str, catalog: &[ItemContext]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for item in catalog {
        let name = normalize(&item.name);
        if !name.is_empty() && needle.contains(&name) && !names.contains(&item.name) {
            names.push(item.name.clone());
            if names.len() == MAX_RECOVERED_ITEMS {
                return names;
            }
        }
    }
    if !names.is_empty() {
        return names;
    }

    let words: Vec<&str> = needle
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_OVERLAP_WORD_CHARS)
        .collect();
    catalog
        .iter()
        .find(|item| {
            normalize(&item.name)
                .split_whitespace()
                .any(|name_word| words.contains(&name_word))
        })
        .map(|item| vec![item.name.clone()])
        .unwrap_or_default()
}

fn catalog_vocabulary(catalog: &[ItemContext]) -> HashSet<String> {
    catalog
        .iter()
        .flat_map(|item| {
            normalize(&item.name).split_whitespace().map(str::to_string).collect::<Vec<_>>()
        })
        .collect()
}

/// The Arabic dual folds the feminine marker into the suffix: "شاورمتين"
/// is two of "شاورما". Restores both singular spellings a catalog may use
/// and reads the implied quantity.
fn expand_duals(needle: &str, vocabulary: &HashSet<String>) -> (String, Option<i64>) {
    let mut quantity = None;
    let words = needle
        .split_whitespace()
        .map(|word| {
            if let Some(candidates) = dual_candidates(word) {
                if let Some(found) =
                    candidates.into_iter().find(|candidate| vocabulary.contains(candidate))
                {
                    quantity = Some(2);
                    return found;
                }
            }
            word.to_string()
        })
        .collect::<Vec<_>>();
    (words.join(" "), quantity)
}

fn dual_candidates(word: &str) -> Option<[String; 2]> {
    let stem = word.strip_suffix("تين")?;
    if stem.chars().count() < 2 {
        return None;
    }
    Some([format!("{stem}ا"), format!("{stem}ه")])
}

fn extract_quantity(needle: &str) -> Option<i64> {
    for word in needle.split_whitespace() {
        let ascii: String = word.chars().map(fold_digit).collect();
        if let Ok(value) = ascii.parse::<i64>() {
            if (1..=i64::from(MAX_LINE_QUANTITY)).contains(&value) {
                return Some(value);
            }
            continue;
        }
        if let Some(value) = number_word(&ascii) {
            return Some(value);
        }
    }
    None
}

fn fold_digit(ch: char) -> char {
    match ch {
        '٠'..='٩' => char::from(b'0' + (ch as u32 - 0x0660) as u8),
        '۰'..='۹' => char::from(b'0' + (ch as u32 - 0x06F0) as u8),
        _ => ch,
    }
}

/// Spoken count words in their normalized spellings (ة folded to ه).
fn number_word(word: &str) -> Option<i64> {
    let value = match word {
        "واحد" | "واحده" | "وحده" | "one" => 1,
        "اثنين" | "اتنين" | "ثنتين" | "اثنتين" | "تنين" | "two" => 2,
        "ثلاثه" | "تلاته" | "ثلاث" | "تلات" | "three" => 3,
        "اربعه" | "اربع" | "four" => 4,
        "خمسه" | "خمس" | "five" => 5,
        "سته" | "ست" | "six" => 6,
        "سبعه" | "سبع" | "seven" => 7,
        "ثمانيه" | "تمانيه" | "ثمان" | "eight" => 8,
        "تسعه" | "تسع" | "nine" => 9,
        "عشره" | "عشر" | "ten" => 10,
        _ => return None,
    };
    Some(value)
}

fn size_word(size: SizeHint) -> &'static str {
    match size {
        SizeHint::Small => "صغير",
        SizeHint::Medium => "وسط",
        SizeHint::Large => "كبير",
        SizeHint::Family => "عايلي",
    }
}
