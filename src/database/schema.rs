use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "photo_entity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PhotoEntity {
    Recipe,
    Step,
}

/// Aggregate root. Identity and timestamps are `None` until the recipe has been saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub description: String,

    /// Minutes
    pub cook_time: i32,
    /// Minutes
    pub prep_time: i32,
    pub servings: Option<i16>,
    pub url: String,

    pub main_photo: Option<Photo>,
    pub steps: Vec<Step>,
    pub ingredients: Vec<RecipeIngredient>,
    pub labels: Vec<Label>,
    pub photos: Vec<Photo>,

    pub in_meal_plan: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Recipe {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    pub uuid: Option<Uuid>,
    /// 1-based, contiguous within a recipe
    pub order: i16,
    pub description: String,
    pub photos: Vec<Photo>,
}

impl Step {
    pub fn new(order: i16, description: &str) -> Self {
        Self {
            order,
            description: description.to_string(),
            ..Default::default()
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Ingredient {
    pub uuid: Option<Uuid>,
    pub name: String,
}

impl Ingredient {
    pub fn named(name: &str) -> Self {
        Self {
            uuid: None,
            name: name.to_string(),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub abbreviation: String,
}

impl Unit {
    pub fn named(name: &str, abbreviation: &str) -> Self {
        Self {
            uuid: None,
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub color: String,
}

impl Label {
    pub fn named(name: &str, color: &str) -> Self {
        Self {
            uuid: None,
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

/// One recipe's use of a shared ingredient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeIngredient {
    pub ingredient: Ingredient,
    pub unit: Option<Unit>,
    pub quantity: f64,
    pub preparation: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    pub uuid: Option<Uuid>,
    pub url: String,
}

impl Photo {
    pub fn from_url(url: &str) -> Self {
        Self {
            uuid: None,
            url: url.to_string(),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub cook_time: i32,
    pub prep_time: i32,
    pub servings: Option<i16>,
    pub url: String,
    pub main_photo_id: Option<Uuid>,
    pub in_meal_plan: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct StepRow {
    pub uuid: Uuid,
    pub step_order: i16,
    pub description: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct PhotoRow {
    pub uuid: Uuid,
    pub url: String,
    pub entity_id: Uuid,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Self {
        Self {
            uuid: Some(row.uuid),
            url: row.url,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub ingredient_uuid: Uuid,
    pub ingredient_name: String,
    pub unit_uuid: Option<Uuid>,
    pub unit_name: Option<String>,
    pub unit_abbreviation: Option<String>,
    pub quantity: f64,
    pub preparation: String,
    pub notes: String,
}

impl From<RecipeIngredientRow> for RecipeIngredient {
    fn from(row: RecipeIngredientRow) -> Self {
        let unit = match (row.unit_uuid, row.unit_name) {
            (Some(uuid), Some(name)) => Some(Unit {
                uuid: Some(uuid),
                name,
                abbreviation: row.unit_abbreviation.unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            ingredient: Ingredient {
                uuid: Some(row.ingredient_uuid),
                name: row.ingredient_name,
            },
            unit,
            quantity: row.quantity,
            preparation: row.preparation,
            notes: row.notes,
        }
    }
}
