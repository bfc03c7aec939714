use serde::{Deserialize, Serialize};

/// Latin spellings customers actually type for common dishes, mapped onto
/// the Arabic catalog spelling. Applied word by word after basic
/// normalization, so "shawarma kbir" and "شاورما كبير" normalize alike.
const TRANSLITERATIONS: &[(&str, &str)] = &[
    ("shawarma", "شاورما"),
    ("shawerma", "شاورما"),
    ("shwarma", "شاورما"),
    ("falafel", "فلافل"),
    ("flafel", "فلافل"),
    ("hummus", "حمص"),
    ("hommos", "حمص"),
    ("burger", "برجر"),
    ("pizza", "بيتزا"),
    ("broasted", "بروستد"),
    ("kebab", "كباب"),
    ("kabab", "كباب"),
    ("mansaf", "منسف"),
    ("maqluba", "مقلوبه"),
    ("makloubeh", "مقلوبه"),
    ("fattoush", "فتوش"),
    ("tabbouleh", "تبوله"),
    ("knafeh", "كنافه"),
    ("kunafa", "كنافه"),
    ("kbir", "كبير"),
    ("kbeer", "كبير"),
    ("sghir", "صغير"),
    ("zghir", "صغير"),
    ("wasat", "وسط"),
];

/// Size words are matched on normalized text, so the tables hold the
/// normalized forms only (ة already folded to ه, ى to ي).
const SMALL_WORDS: &[&str] = &["صغير", "صغيره", "صغار", "سمول", "small"];
const MEDIUM_WORDS: &[&str] = &["وسط", "متوسط", "ميديم", "medium"];
const LARGE_WORDS: &[&str] = &["كبير", "كبيره", "كبار", "لارج", "large", "big"];
const FAMILY_WORDS: &[&str] = &["عايلي", "عايليه", "عيله", "فاميلي", "family"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeHint {
    Small,
    Medium,
    Large,
    Family,
}

impl SizeHint {
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Small => SMALL_WORDS,
            Self::Medium => MEDIUM_WORDS,
            Self::Large => LARGE_WORDS,
            Self::Family => FAMILY_WORDS,
        }
    }

    /// Matches one already-normalized word.
    pub fn from_word(word: &str) -> Option<Self> {
        for (hint, words) in [
            (Self::Small, SMALL_WORDS),
            (Self::Medium, MEDIUM_WORDS),
            (Self::Large, LARGE_WORDS),
            (Self::Family, FAMILY_WORDS),
        ] {
            if words.contains(&word) {
                return Some(hint);
            }
        }
        None
    }

    /// Reads a free-form size label (as the language model reports it).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize(value);
        normalized.split_whitespace().find_map(Self::from_word)
    }
}

/// Canonical matching form: lowercase, Arabic diacritics and tatweel
/// stripped, letter variants folded (أ إ آ ٱ to ا, ة to ه, ى to ي, ؤ to و,
/// ئ to ي), Latin dish spellings transliterated, whitespace collapsed.
pub fn normalize(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            // Harakat, shadda, sukun, superscript alef, tatweel.
            '\u{064B}'..='\u{0652}' | '\u{0670}' | '\u{0640}' => {}
            'أ' | 'إ' | 'آ' | 'ٱ' => folded.push('ا'),
            'ة' => folded.push('ه'),
            'ى' => folded.push('ي'),
            'ؤ' => folded.push('و'),
            'ئ' => folded.push('ي'),
            _ if ch.is_alphanumeric() => {
                for lower in ch.to_lowercase() {
                    folded.push(lower);
                }
            }
            _ => folded.push(' '),
        }
    }

    folded
        .split_whitespace()
        .map(transliterate_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn transliterate_word(word: &str) -> &str {
    TRANSLITERATIONS
        .iter()
        .find(|(latin, _)| *latin == word)
        .map(|(_, arabic)| *arabic)
        .unwrap_or(word)
}

/// Normalizes the phrase and pulls out the first size word, returning the
/// remaining phrase and the captured hint. "شاورما كبيرة" becomes
/// ("شاورما", Large).
pub fn strip_size(phrase: &str) -> (String, Option<SizeHint>) {
    let normalized = normalize(phrase);
    let mut hint = None;
    let mut kept = Vec::new();

    for word in normalized.split_whitespace() {
        if hint.is_none() {
            if let Some(found) = SizeHint::from_word(word) {
                hint = Some(found);
                continue;
            }
        }
        kept.push(word);
    }

    (kept.join(" "), hint)
}
