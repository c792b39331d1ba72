use async_trait::async_trait;

use super::{
    card::Card,
    parser::{IngredientParser, ParsedIngredient},
    tables::UnitTable,
};
use crate::schema::{Ingredient, Label, Photo, Recipe, RecipeIngredient, Step, Unit};

/// Converts a card into a recipe. Implemented by the rule based normalizer below and by
/// model-backed clients living outside this crate.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, card: &Card) -> anyhow::Result<Recipe>;
}

/// Free-text recipe as it arrives from an import source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecipe {
    pub name: String,
    pub description: String,
    pub url: String,
    /// The description is scanned instead when this is `None` or none of its lines parse.
    pub ingredient_lines: Option<Vec<String>>,
    /// `None` splits the description into steps instead.
    pub step_lines: Option<Vec<String>>,
    pub labels: Vec<Label>,
    pub photos: Vec<String>,
    pub main_photo: Option<String>,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecipeTextNormalizer<'a> {
    parser: IngredientParser<'a>,
}

impl RecipeTextNormalizer<'static> {
    pub fn standard() -> Self {
        Self::new(IngredientParser::standard())
    }
}

impl<'a> RecipeTextNormalizer<'a> {
    pub fn new(parser: IngredientParser<'a>) -> Self {
        Self { parser }
    }

    pub fn units(&self) -> &'a UnitTable {
        self.parser.units()
    }

    pub fn normalize(&self, raw: &RawRecipe) -> Recipe {
        let steps = match &raw.step_lines {
            Some(lines) => self.steps_from_lines(lines.iter().map(String::as_str)),
            None => self.extract_steps(&raw.description),
        };

        let mut ingredients: Vec<RecipeIngredient> = raw
            .ingredient_lines
            .iter()
            .flatten()
            .filter_map(|line| self.parse_ingredient_line(line))
            .collect();
        if ingredients.is_empty() {
            ingredients = self.extract_ingredients_from_description(&raw.description);
        }

        let main_photo = raw
            .main_photo
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(Photo::from_url);

        Recipe {
            name: self.normalize_name(&raw.name),
            description: self.normalize_description(&raw.description),
            url: raw.url.trim().to_string(),
            main_photo,
            steps,
            ingredients,
            labels: raw
                .labels
                .iter()
                .filter(|label| !label.name.trim().is_empty())
                .cloned()
                .collect(),
            photos: raw
                .photos
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .map(Photo::from_url)
                .collect(),
            ..Default::default()
        }
    }

    pub fn normalize_name(&self, name: &str) -> String {
        capitalize(name.trim())
    }

    pub fn normalize_description(&self, description: &str) -> String {
        capitalize(description.trim())
    }

    /// Capitalized, and ending in a full stop unless it already ends a sentence.
    pub fn normalize_step(&self, step: &str) -> String {
        let mut text = capitalize(step.trim());
        if !text.is_empty() && !text.ends_with(&['.', '!', '?'][..]) {
            text.push('.');
        }
        text
    }

    /// One step per non-blank line, numbered from 1.
    pub fn extract_steps(&self, text: &str) -> Vec<Step> {
        self.steps_from_lines(text.lines())
    }

    fn steps_from_lines<'l>(&self, lines: impl Iterator<Item = &'l str>) -> Vec<Step> {
        lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| Step::new((index + 1) as i16, &self.normalize_step(line)))
            .collect()
    }

    /// Parses description lines as ingredients, skipping ones that look like numbered steps.
    pub fn extract_ingredients_from_description(&self, description: &str) -> Vec<RecipeIngredient> {
        description
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with("1.") && !line.starts_with("Step"))
            .filter_map(|line| self.parse_ingredient_line(line))
            .collect()
    }

    /// `None` when the line has no usable ingredient name.
    pub fn parse_ingredient_line(&self, line: &str) -> Option<RecipeIngredient> {
        let parsed = self.parser.parse(line);
        if !parsed.is_usable() {
            log::warn!("Dropping ingredient line without a name: '{}'", line.trim());
            return None;
        }

        Some(self.to_recipe_ingredient(parsed))
    }

    fn to_recipe_ingredient(&self, parsed: ParsedIngredient) -> RecipeIngredient {
        RecipeIngredient {
            ingredient: Ingredient::named(&parsed.name),
            unit: self.unit(&parsed.unit),
            quantity: parsed.quantity,
            preparation: String::new(),
            notes: parsed.notes,
        }
    }

    /// Canonical unit with its abbreviation; unknown units are kept as written.
    pub fn unit(&self, name: &str) -> Option<Unit> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let units = self.units();
        let canonical = units
            .canonical(name)
            .map(str::to_string)
            .unwrap_or_else(|| name.to_lowercase());
        let abbreviation = units.abbreviation(&canonical).unwrap_or("");

        Some(Unit::named(&canonical, abbreviation))
    }
}

/// Normalizer that only uses the line parser and text rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleBasedNormalizer<'a> {
    text: RecipeTextNormalizer<'a>,
}

impl RuleBasedNormalizer<'static> {
    pub fn standard() -> Self {
        Self::new(RecipeTextNormalizer::standard())
    }
}

impl<'a> RuleBasedNormalizer<'a> {
    pub fn new(text: RecipeTextNormalizer<'a>) -> Self {
        Self { text }
    }
}

#[async_trait]
impl<'a> Normalizer for RuleBasedNormalizer<'a> {
    async fn normalize(&self, card: &Card) -> anyhow::Result<Recipe> {
        let recipe = self.text.normalize(&RawRecipe::from(card));

        if recipe.name.is_empty() {
            anyhow::bail!("card '{}' has no name", card.id);
        }

        Ok(recipe)
    }
}
