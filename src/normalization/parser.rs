use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tables::{ParserVocabulary, UnitTable};

/*
Quantity forms, tried in this order:

    2 1/2       mixed number
    3-5         range, averaged (1-2-3 keeps the outer bounds)
    1/2         fraction
    12, 2.5     integer / decimal
*/
static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<whole>\d+)\s+(?P<mnum>\d+)/(?P<mden>\d+)|(?P<lo>\d+(?:\.\d+)?)(?:\s*-\s*\d+(?:\.\d+)?)*\s*-\s*(?P<hi>\d+(?:\.\d+)?)|(?P<num>\d+)/(?P<den>\d+)|(?P<value>\d+(?:\.\d+)?))\s*",
    )
    .expect("quantity pattern is valid")
});

pub const DEFAULT_QUANTITY: f64 = 1.;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: f64,
    pub unit: String,
    pub name: String,
    pub notes: String,
}

impl Default for ParsedIngredient {
    fn default() -> Self {
        Self {
            quantity: DEFAULT_QUANTITY,
            unit: String::new(),
            name: String::new(),
            notes: String::new(),
        }
    }
}

impl ParsedIngredient {
    pub fn is_usable(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Turns free-text ingredient lines such as `"2 1/2 tbsp fresh basil, chopped"` into
/// structured fields. Parsing never fails; malformed input yields a best-effort result.
#[derive(Debug, Clone, Copy)]
pub struct IngredientParser<'a> {
    units: &'a UnitTable,
    vocabulary: &'a ParserVocabulary,
}

impl IngredientParser<'static> {
    pub fn standard() -> Self {
        Self::new(UnitTable::standard(), ParserVocabulary::standard())
    }
}

impl<'a> IngredientParser<'a> {
    pub fn new(units: &'a UnitTable, vocabulary: &'a ParserVocabulary) -> Self {
        Self { units, vocabulary }
    }

    pub fn units(&self) -> &'a UnitTable {
        self.units
    }

    pub fn parse(&self, raw: &str) -> ParsedIngredient {
        let mut result = ParsedIngredient::default();
        let mut notes: Vec<String> = vec![];

        let mut remaining = raw.trim();

        if let Some((quantity, consumed)) = extract_quantity(remaining) {
            if let Some(quantity) = quantity {
                result.quantity = quantity;
            }
            remaining = remaining[consumed..].trim_start_matches('-').trim_start();
        }

        if let Some((unit, rest)) = self.extract_unit(remaining) {
            result.unit = unit;
            remaining = rest;
        }

        let mut text = remaining.to_string();

        if let Some(open) = text.find('(') {
            if let Some(len) = text[open..].find(')') {
                let close = open + len;
                push_note(&mut notes, &text[open + 1..close]);
                text.replace_range(open..=close, "");
            }
        }

        if let Some(comma) = text.find(',') {
            push_note(&mut notes, &text[comma + 1..]);
            text.truncate(comma);
        }

        let mut name = text.trim().to_string();

        for prefix in &self.vocabulary.filler_prefixes {
            if starts_with_ignore_case(&name, prefix) {
                name = name[prefix.len()..].trim_start().to_string();
                break;
            }
        }

        for suffix in &self.vocabulary.descriptor_suffixes {
            if ends_with_ignore_case(&name, suffix) {
                name.truncate(name.len() - suffix.len());
                push_note(&mut notes, suffix.trim_start_matches(|c| c == ',' || c == ' '));
                break;
            }
        }

        if let Some(replacement) = self.vocabulary.replacement(name.trim()) {
            name = replacement.to_string();
        }

        for marker in &self.vocabulary.special_markers {
            if remove_ignore_case(&mut name, marker) {
                push_note(&mut notes, marker);
            }
        }

        result.name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        result.notes = notes.join(", ").trim().to_string();

        result
    }

    /// Matches the leading word against the unit table and consumes it plus one space.
    fn extract_unit<'s>(&self, text: &'s str) -> Option<(String, &'s str)> {
        let (word, rest) = match text.find(char::is_whitespace) {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => (text, ""),
        };

        let word = word.strip_suffix('.').unwrap_or(word);
        if word.is_empty() {
            return None;
        }

        self.units
            .canonical(word)
            .map(|canonical| (canonical.to_string(), rest))
    }
}

/// Returns the parsed quantity (None when a fraction divides by zero) and the number
/// of bytes consumed, including trailing whitespace.
fn extract_quantity(text: &str) -> Option<(Option<f64>, usize)> {
    let captures = QUANTITY.captures(text)?;
    let consumed = captures.get(0).map(|m| m.end()).unwrap_or(0);

    let number = |name: &str| -> Option<f64> {
        captures
            .name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    let quantity = if let Some(whole) = number("whole") {
        match divide(number("mnum"), number("mden")) {
            Some(fraction) => Some(whole + fraction),
            None => Some(whole),
        }
    } else if let (Some(lo), Some(hi)) = (number("lo"), number("hi")) {
        Some((lo + hi) / 2.)
    } else if captures.name("den").is_some() {
        divide(number("num"), number("den"))
    } else {
        number("value")
    };

    Some((quantity, consumed))
}

fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0. => Some(n / d),
        _ => None,
    }
}

fn push_note(notes: &mut Vec<String>, note: &str) {
    let note = note.trim();
    if !note.is_empty() {
        notes.push(note.to_string());
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    let start = match text.len().checked_sub(suffix.len()) {
        Some(start) => start,
        None => return false,
    };
    text.is_char_boundary(start) && text[start..].eq_ignore_ascii_case(suffix)
}

/// Removes every case-insensitive occurrence of `needle`; true if anything was removed.
fn remove_ignore_case(text: &mut String, needle: &str) -> bool {
    let mut removed = false;
    while let Some(idx) = text.to_ascii_lowercase().find(needle) {
        text.replace_range(idx..idx + needle.len(), " ");
        removed = true;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedIngredient {
        IngredientParser::standard().parse(raw)
    }

    fn assert_parsed(raw: &str, quantity: f64, unit: &str, name: &str, notes: &str) {
        let parsed = parse(raw);
        assert!(
            (parsed.quantity - quantity).abs() < 1e-9,
            "{raw:?}: quantity {} != {quantity}",
            parsed.quantity
        );
        assert_eq!(parsed.unit, unit, "{raw:?}: unit");
        assert_eq!(parsed.name, name, "{raw:?}: name");
        assert_eq!(parsed.notes, notes, "{raw:?}: notes");
    }

    #[test]
    fn quantity_unit_name_lines() {
        let cases: &[(&str, f64, &str, &str)] = &[
            ("2 tbsp sugar", 2., "tablespoon", "sugar"),
            ("12 g yeast", 12., "gram", "yeast"),
            ("2.5 cups flour", 2.5, "cup", "flour"),
            ("1 TSP salt", 1., "teaspoon", "salt"),
            ("3 stalks celery", 3., "stalk", "celery"),
            ("1.5 l vegetable stock", 1.5, "liter", "vegetable stock"),
            ("200g butter", 200., "gram", "butter"),
        ];

        for (raw, quantity, unit, name) in cases {
            assert_parsed(raw, *quantity, unit, name, "");
        }
    }

    #[test]
    fn mixed_numbers_add_the_fraction() {
        assert_parsed("2 1/2 tbsp flour", 2.5, "tablespoon", "flour", "");
    }

    #[test]
    fn ranges_take_the_mean() {
        assert_parsed("3-5 cloves garlic, minced", 4., "", "cloves garlic", "minced");
        assert_parsed("1.5 - 2 cups milk", 1.75, "cup", "milk", "");
    }

    #[test]
    fn chained_and_dangling_dashes_stay_out_of_the_name() {
        assert_parsed("1-2-3 eggs", 2., "", "eggs", "");
        assert_parsed("2- eggs", 2., "", "eggs", "");
    }

    #[test]
    fn fractions_and_zero_denominators() {
        assert_parsed("1/2 cup sugar", 0.5, "cup", "sugar", "");
        assert_parsed("1/0 cup sugar", DEFAULT_QUANTITY, "cup", "sugar", "");
    }

    #[test]
    fn missing_quantity_defaults_to_one() {
        assert_parsed("a pinch of salt", 1., "", "pinch of salt", "");
        assert_parsed("salt", 1., "", "salt", "");
    }

    #[test]
    fn a_lone_unit_keeps_the_default_quantity() {
        assert_parsed("tbsp", 1., "tablespoon", "", "");
    }

    #[test]
    fn empty_input_yields_defaults() {
        let parsed = parse("   ");
        assert_eq!(parsed, ParsedIngredient::default());
        assert!(!parsed.is_usable());
    }

    #[test]
    fn parentheses_and_commas_become_notes() {
        assert_parsed("1 (400g) tin chickpeas", 1., "", "tin chickpeas", "400g");
        assert_parsed(
            "1 cup (packed) brown sugar, sifted",
            1.,
            "cup",
            "brown sugar",
            "packed, sifted",
        );
        assert_parsed("2 tbsp fresh basil, chopped", 2., "tablespoon", "fresh basil", "chopped");
    }

    #[test]
    fn synonyms_replace_whole_names() {
        assert_parsed("2 Tomatoes", 2., "", "tomato", "");
        assert_parsed("1 red pepper, sliced", 1., "", "pepper", "sliced");
        assert_parsed("1 red pepper flakes", 1., "", "red pepper flakes", "");
    }

    #[test]
    fn special_markers_move_into_notes() {
        assert_parsed("1 lemon juice only", 1., "", "lemon", "juice only");
        assert_parsed("1 lime Zested", 1., "", "lime", "zested");
        assert_parsed("1 lemon (unwaxed) zested", 1., "", "lemon", "unwaxed, zested");
    }

    #[test]
    fn descriptor_suffixes_come_from_the_vocabulary() {
        let units = UnitTable::standard();
        let vocabulary = ParserVocabulary::new(&["of "], &[" leaves"], &[], &[]);
        let parser = IngredientParser::new(units, &vocabulary);

        let parsed = parser.parse("2 tbsp of basil leaves");
        assert_eq!(parsed.unit, "tablespoon");
        assert_eq!(parsed.name, "basil");
        assert_eq!(parsed.notes, "leaves");
    }

    #[test]
    fn unit_tokens_only_match_whole_words() {
        assert_parsed("2 lbs potatoes", 2., "", "lbs potatoes", "");
        assert_parsed("2 lb potatoes", 2., "pound", "potatoes", "");
        assert_parsed("1 tbsp. honey", 1., "tablespoon", "honey", "");
    }
}
