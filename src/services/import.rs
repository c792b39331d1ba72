use sqlx::{Pool, Postgres};
use thiserror::Error;

use crate::{
    actions::recipes::{modify_recipe, save_recipe},
    error::QueryError,
    form::{FormError, ImportRecipeRequest, UpdateRecipeRequest, ValidationError},
    normalizer::RecipeTextNormalizer,
    schema::{Recipe, Uuid},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Decode(#[from] FormError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to store recipe: {0}")]
    Store(#[from] QueryError),
}

/// Turns import and update requests into stored recipes.
#[derive(Debug, Clone)]
pub struct ImportService<'a> {
    pool: Pool<Postgres>,
    normalizer: RecipeTextNormalizer<'a>,
}

impl ImportService<'static> {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_normalizer(pool, RecipeTextNormalizer::standard())
    }
}

impl<'a> ImportService<'a> {
    pub fn with_normalizer(pool: Pool<Postgres>, normalizer: RecipeTextNormalizer<'a>) -> Self {
        Self { pool, normalizer }
    }

    pub async fn import_json(&self, json: &str) -> Result<Recipe, ImportError> {
        let request = ImportRecipeRequest::from_json(json)?;
        self.import_recipe(request).await
    }

    pub async fn import_recipe(&self, request: ImportRecipeRequest) -> Result<Recipe, ImportError> {
        request.validate()?;

        let recipe = request.into_recipe(&self.normalizer);
        // Every ingredient line may have been unparseable
        if recipe.ingredients.is_empty() {
            return Err(ValidationError::MissingIngredients.into());
        }

        let saved = save_recipe(recipe, &self.pool).await.map_err(|e| {
            log::error!("Failed to save imported recipe: {}", e);
            e
        })?;

        log::info!(
            "Imported recipe '{}' ({})",
            saved.name,
            saved.uuid.map(|id| id.to_string()).unwrap_or_default()
        );
        Ok(saved)
    }

    /// Applies a partial update on top of the stored recipe, reading and writing it in one
    /// transaction. Unknown or archived recipes are reported as not found before anything is
    /// written.
    pub async fn update_from_request(
        &self,
        id: Uuid,
        request: UpdateRecipeRequest,
    ) -> Result<Recipe, ImportError> {
        request.validate()?;

        let normalizer = self.normalizer;
        let apply = move |existing: Recipe| -> Result<Recipe, ImportError> {
            let recipe = request.apply_to(existing, &normalizer);
            if recipe.ingredients.is_empty() {
                return Err(ValidationError::MissingIngredients.into());
            }
            Ok(recipe)
        };

        let updated = modify_recipe(id, apply, &self.pool).await.map_err(|e| {
            if let ImportError::Store(e) = &e {
                log::error!("Failed to update recipe {}: {}", id, e);
            }
            e
        })?;

        Ok(updated)
    }
}
