//! Strict decoding of recipe import and update requests.
//!
//! Requests are decoded straight into typed structures; a field of the wrong JSON type fails
//! the whole decode. Content rules (required name, steps, ingredients) are checked separately
//! by `validate` so the caller can report them before anything is written.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    normalizer::RecipeTextNormalizer,
    parser::DEFAULT_QUANTITY,
    schema::{Ingredient, Label, Photo, Recipe, RecipeIngredient, Step},
};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("malformed request: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("recipe name is required")]
    MissingName,

    #[error("at least one step is required")]
    MissingSteps,

    #[error("at least one ingredient is required")]
    MissingIngredients,

    #[error("step {index} has no description")]
    EmptyStep { index: usize },

    #[error("ingredient {index} has no name")]
    EmptyIngredientName { index: usize },

    #[error("ingredient {index} has a negative quantity")]
    NegativeQuantity { index: usize },

    #[error("servings must be a positive number")]
    InvalidServings,
}

pub fn decode<T: DeserializeOwned>(json: &str) -> Result<T, FormError> {
    Ok(serde_json::from_str(json)?)
}

pub fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T, FormError> {
    Ok(serde_json::from_value(value)?)
}

/// A step is either bare text or an object with a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepInput {
    PlainText(String),
    DescribedStep {
        #[serde(default)]
        order: Option<i16>,
        description: String,
        #[serde(default)]
        photos: Vec<String>,
    },
}

impl StepInput {
    pub fn description(&self) -> &str {
        match self {
            Self::PlainText(text) => text,
            Self::DescribedStep { description, .. } => description,
        }
    }
}

/// An ingredient is either a free-text line to be parsed or already structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientInput {
    Line(String),
    Structured(StructuredIngredient),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredIngredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub preparation: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelInput {
    Name(String),
    Described {
        name: String,
        #[serde(default)]
        color: String,
    },
}

impl LabelInput {
    fn to_label(&self) -> Option<Label> {
        let (name, color) = match self {
            Self::Name(name) => (name.as_str(), ""),
            Self::Described { name, color } => (name.as_str(), color.as_str()),
        };

        let name = name.trim();
        (!name.is_empty()).then(|| Label::named(name, color.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportRecipeRequest {
    pub name: String,
    pub description: String,
    #[serde(alias = "cook_time")]
    pub cook_time: i32,
    #[serde(alias = "prep_time")]
    pub prep_time: i32,
    pub servings: Option<i16>,
    pub url: String,
    pub steps: Vec<StepInput>,
    pub ingredients: Vec<IngredientInput>,
    pub labels: Vec<LabelInput>,
    #[serde(alias = "main_photo")]
    pub main_photo: Option<String>,
    pub photos: Vec<String>,
}

impl ImportRecipeRequest {
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        decode(json)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        check_steps(&self.steps)?;
        check_ingredients(&self.ingredients)?;
        check_servings(self.servings)
    }

    pub fn into_recipe(self, normalizer: &RecipeTextNormalizer) -> Recipe {
        Recipe {
            name: normalizer.normalize_name(&self.name),
            description: normalizer.normalize_description(&self.description),
            cook_time: self.cook_time.max(0),
            prep_time: self.prep_time.max(0),
            servings: self.servings.filter(|servings| *servings > 0),
            url: self.url.trim().to_string(),
            main_photo: photo(self.main_photo.as_deref()),
            steps: steps_from(&self.steps, normalizer),
            ingredients: ingredients_from(&self.ingredients, normalizer),
            labels: self.labels.iter().filter_map(LabelInput::to_label).collect(),
            photos: self.photos.iter().filter_map(|url| photo(Some(url))).collect(),
            ..Default::default()
        }
    }
}

/// Partial update: fields left out keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "cook_time")]
    pub cook_time: Option<i32>,
    #[serde(alias = "prep_time")]
    pub prep_time: Option<i32>,
    pub servings: Option<i16>,
    pub url: Option<String>,
    pub steps: Option<Vec<StepInput>>,
    pub ingredients: Option<Vec<IngredientInput>>,
    pub labels: Option<Vec<LabelInput>>,
    /// An empty string removes the main photo.
    #[serde(alias = "main_photo")]
    pub main_photo: Option<String>,
    pub photos: Option<Vec<String>>,
}

impl UpdateRecipeRequest {
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        decode(json)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ValidationError::MissingName);
        }
        if let Some(steps) = &self.steps {
            check_steps(steps)?;
        }
        if let Some(ingredients) = &self.ingredients {
            check_ingredients(ingredients)?;
        }
        check_servings(self.servings)
    }

    pub fn apply_to(self, existing: Recipe, normalizer: &RecipeTextNormalizer) -> Recipe {
        Recipe {
            name: self
                .name
                .map(|name| normalizer.normalize_name(&name))
                .unwrap_or(existing.name),
            description: self
                .description
                .map(|description| normalizer.normalize_description(&description))
                .unwrap_or(existing.description),
            cook_time: self.cook_time.map(|t| t.max(0)).unwrap_or(existing.cook_time),
            prep_time: self.prep_time.map(|t| t.max(0)).unwrap_or(existing.prep_time),
            servings: match self.servings {
                Some(servings) => Some(servings).filter(|servings| *servings > 0),
                None => existing.servings,
            },
            url: self
                .url
                .map(|url| url.trim().to_string())
                .unwrap_or(existing.url),
            main_photo: match self.main_photo {
                Some(url) => photo(Some(&url)),
                None => existing.main_photo,
            },
            steps: self
                .steps
                .map(|steps| steps_from(&steps, normalizer))
                .unwrap_or(existing.steps),
            ingredients: self
                .ingredients
                .map(|ingredients| ingredients_from(&ingredients, normalizer))
                .unwrap_or(existing.ingredients),
            labels: self
                .labels
                .map(|labels| labels.iter().filter_map(LabelInput::to_label).collect())
                .unwrap_or(existing.labels),
            photos: self
                .photos
                .map(|photos| photos.iter().filter_map(|url| photo(Some(url))).collect())
                .unwrap_or(existing.photos),
            ..existing
        }
    }
}

fn check_steps(steps: &[StepInput]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::MissingSteps);
    }

    match steps.iter().position(|step| step.description().trim().is_empty()) {
        Some(index) => Err(ValidationError::EmptyStep { index: index + 1 }),
        None => Ok(()),
    }
}

fn check_ingredients(ingredients: &[IngredientInput]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::MissingIngredients);
    }

    for (index, ingredient) in ingredients.iter().enumerate() {
        let index = index + 1;
        match ingredient {
            IngredientInput::Line(line) if line.trim().is_empty() => {
                return Err(ValidationError::EmptyIngredientName { index })
            }
            IngredientInput::Structured(structured) => {
                if structured.name.trim().is_empty() {
                    return Err(ValidationError::EmptyIngredientName { index });
                }
                if structured.quantity.is_some_and(|quantity| quantity < 0.) {
                    return Err(ValidationError::NegativeQuantity { index });
                }
            }
            IngredientInput::Line(_) => {}
        }
    }

    Ok(())
}

/// Zero is read as "not given".
fn check_servings(servings: Option<i16>) -> Result<(), ValidationError> {
    match servings {
        Some(servings) if servings < 0 => Err(ValidationError::InvalidServings),
        _ => Ok(()),
    }
}

fn photo(url: Option<&str>) -> Option<Photo> {
    url.map(str::trim)
        .filter(|url| !url.is_empty())
        .map(Photo::from_url)
}

/// Steps with an explicit order are sorted by it, the rest keep their position.
fn steps_from(inputs: &[StepInput], normalizer: &RecipeTextNormalizer) -> Vec<Step> {
    let mut ordered: Vec<(i16, &StepInput)> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| match input {
            StepInput::DescribedStep {
                order: Some(order), ..
            } => (*order, input),
            _ => ((index + 1) as i16, input),
        })
        .collect();
    ordered.sort_by_key(|(order, _)| *order);

    ordered
        .into_iter()
        .filter(|(_, input)| !input.description().trim().is_empty())
        .enumerate()
        .map(|(index, (_, input))| {
            let mut step = Step::new((index + 1) as i16, &normalizer.normalize_step(input.description()));
            if let StepInput::DescribedStep { photos, .. } = input {
                step.photos = photos.iter().filter_map(|url| photo(Some(url))).collect();
            }
            step
        })
        .collect()
}

fn ingredients_from(
    inputs: &[IngredientInput],
    normalizer: &RecipeTextNormalizer,
) -> Vec<RecipeIngredient> {
    inputs
        .iter()
        .filter_map(|input| match input {
            IngredientInput::Line(line) => normalizer.parse_ingredient_line(line),
            IngredientInput::Structured(structured) => {
                let name = structured.name.trim();
                (!name.is_empty()).then(|| RecipeIngredient {
                    ingredient: Ingredient::named(name),
                    unit: normalizer.unit(&structured.unit),
                    quantity: structured.quantity.unwrap_or(DEFAULT_QUANTITY),
                    preparation: structured.preparation.trim().to_string(),
                    notes: structured.notes.trim().to_string(),
                })
            }
        })
        .collect()
}
