pub const RECIPE_COUNT_PER_PAGE: i64 = 20;
pub const MAX_RECIPE_COUNT_PER_PAGE: i64 = 100;

pub const DEFAULT_LABEL_COLOR: &str = "#3498db";

/// How many lookup/insert rounds a reference entity gets before giving up.
pub const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Raw unit token -> canonical unit name
pub const UNIT_ALIASES: &[(&str, &str)] = &[
    ("tbsp", "tablespoon"),
    ("tbspn", "tablespoon"),
    ("tbs", "tablespoon"),
    ("tablespoon", "tablespoon"),
    ("tablespoons", "tablespoon"),
    ("tsp", "teaspoon"),
    ("teaspoon", "teaspoon"),
    ("teaspoons", "teaspoon"),
    ("g", "gram"),
    ("gram", "gram"),
    ("grams", "gram"),
    ("kg", "kilogram"),
    ("kilogram", "kilogram"),
    ("kilograms", "kilogram"),
    ("ml", "milliliter"),
    ("milliliter", "milliliter"),
    ("milliliters", "milliliter"),
    ("l", "liter"),
    ("liter", "liter"),
    ("liters", "liter"),
    ("cup", "cup"),
    ("cups", "cup"),
    ("oz", "ounce"),
    ("ounce", "ounce"),
    ("ounces", "ounce"),
    ("lb", "pound"),
    ("pound", "pound"),
    ("pounds", "pound"),
    ("stalk", "stalk"),
    ("stalks", "stalk"),
    ("piece", "piece"),
    ("pieces", "piece"),
    ("packet", "packet"),
    ("packets", "packet"),
];

/// Canonical unit name -> abbreviation
pub const UNIT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("tablespoon", "tbsp"),
    ("teaspoon", "tsp"),
    ("gram", "g"),
    ("kilogram", "kg"),
    ("milliliter", "ml"),
    ("liter", "l"),
    ("ounce", "oz"),
    ("pound", "lb"),
    ("cup", "cup"),
    ("piece", "pc"),
    ("packet", "pkt"),
    ("stalk", "stalk"),
];

pub const FILLER_PREFIXES: &[&str] = &["of ", "a ", "an ", "some ", "about ", "approximately "];

pub const DESCRIPTOR_SUFFIXES: &[&str] = &[
    ", chopped",
    ", diced",
    ", sliced",
    ", minced",
    ", grated",
    ", fresh",
    ", dried",
    ", ground",
    ", whole",
];

pub const INGREDIENT_REPLACEMENTS: &[(&str, &str)] = &[
    ("bell pepper", "pepper"),
    ("red pepper", "pepper"),
    ("green pepper", "pepper"),
    ("yellow pepper", "pepper"),
    ("orange pepper", "pepper"),
    ("chili pepper", "chili"),
    ("chilli pepper", "chili"),
    ("chile pepper", "chili"),
    ("chilli", "chili"),
    ("chile", "chili"),
    ("tomatoes", "tomato"),
];

/// Phrases moved from an ingredient name into its notes
pub const SPECIAL_MARKERS: &[&str] = &["juice only", "zested"];
