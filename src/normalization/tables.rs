use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::constants::{
    DESCRIPTOR_SUFFIXES, FILLER_PREFIXES, INGREDIENT_REPLACEMENTS, SPECIAL_MARKERS,
    UNIT_ABBREVIATIONS, UNIT_ALIASES,
};

static STANDARD_UNITS: Lazy<UnitTable> =
    Lazy::new(|| UnitTable::new(UNIT_ALIASES, UNIT_ABBREVIATIONS));

static STANDARD_VOCABULARY: Lazy<ParserVocabulary> = Lazy::new(|| {
    ParserVocabulary::new(
        FILLER_PREFIXES,
        DESCRIPTOR_SUFFIXES,
        INGREDIENT_REPLACEMENTS,
        SPECIAL_MARKERS,
    )
});

/// Read-only mapping of raw unit tokens to canonical unit names and abbreviations.
///
/// Aliases are keyed by their lowercase form, so lookups are case-insensitive and
/// independent of the order the table was declared in.
#[derive(Debug, Clone)]
pub struct UnitTable {
    aliases: HashMap<String, String>,
    abbreviations: HashMap<String, String>,
}

impl UnitTable {
    pub fn new(aliases: &[(&str, &str)], abbreviations: &[(&str, &str)]) -> Self {
        Self {
            aliases: aliases
                .iter()
                .map(|(alias, canonical)| (alias.to_lowercase(), canonical.to_lowercase()))
                .collect(),
            abbreviations: abbreviations
                .iter()
                .map(|(canonical, abbreviation)| (canonical.to_lowercase(), abbreviation.to_string()))
                .collect(),
        }
    }

    /// The process-wide table built from `constants`.
    pub fn standard() -> &'static UnitTable {
        &STANDARD_UNITS
    }

    /// Canonical name for a raw token, e.g. `"Tbspn"` -> `"tablespoon"`.
    pub fn canonical(&self, token: &str) -> Option<&str> {
        self.aliases
            .get(&token.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Abbreviation for a canonical unit name. Unknown units abbreviate to nothing.
    pub fn abbreviation(&self, canonical: &str) -> Option<&str> {
        self.abbreviations
            .get(&canonical.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Word lists used by the ingredient parser to clean up names.
#[derive(Debug, Clone)]
pub struct ParserVocabulary {
    pub filler_prefixes: Vec<String>,
    pub descriptor_suffixes: Vec<String>,
    replacements: HashMap<String, String>,
    pub special_markers: Vec<String>,
}

impl ParserVocabulary {
    pub fn new(
        filler_prefixes: &[&str],
        descriptor_suffixes: &[&str],
        replacements: &[(&str, &str)],
        special_markers: &[&str],
    ) -> Self {
        Self {
            filler_prefixes: filler_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            descriptor_suffixes: descriptor_suffixes.iter().map(|s| s.to_lowercase()).collect(),
            replacements: replacements
                .iter()
                .map(|(from, to)| (from.to_lowercase(), to.to_string()))
                .collect(),
            special_markers: special_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn standard() -> &'static ParserVocabulary {
        &STANDARD_VOCABULARY
    }

    /// Canonical replacement for a whole ingredient name, matched case-insensitively.
    pub fn replacement(&self, name: &str) -> Option<&str> {
        self.replacements
            .get(&name.to_lowercase())
            .map(String::as_str)
    }
}
