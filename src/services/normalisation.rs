use serde::Serialize;
use sqlx::{Pool, Postgres};
use thiserror::Error;

use crate::{
    actions::recipes::save_recipe,
    card::{Card, CardExport},
    error::QueryError,
    normalizer::Normalizer,
    schema::Recipe,
};

#[derive(Debug, Error)]
pub enum NormaliseError {
    #[error("normalizer failed: {0}")]
    Normalizer(anyhow::Error),

    #[error("failed to store recipe: {0}")]
    Store(#[from] QueryError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalisationSummary {
    pub saved: usize,
    pub failed: usize,
}

/// Runs cards through a [`Normalizer`] and stores what comes out.
pub struct NormalisationService<N> {
    normalizer: N,
    pool: Pool<Postgres>,
}

impl<N: Normalizer> NormalisationService<N> {
    pub fn new(normalizer: N, pool: Pool<Postgres>) -> Self {
        Self { normalizer, pool }
    }

    pub async fn normalise_card(&self, card: &Card) -> Result<Recipe, NormaliseError> {
        let recipe = self.normalizer.normalize(card).await.map_err(|e| {
            log::error!("Failed to normalise card '{}': {:#}", card.id, e);
            NormaliseError::Normalizer(e)
        })?;

        let saved = save_recipe(recipe, &self.pool).await.map_err(|e| {
            log::error!("Failed to save recipe from card '{}': {}", card.id, e);
            e
        })?;

        Ok(saved)
    }

    /// Normalises every open card. A failing card is logged and counted, the rest carry on.
    pub async fn normalise_export(&self, export: &CardExport) -> NormalisationSummary {
        let mut summary = NormalisationSummary::default();

        for card in export.open_cards() {
            match self.normalise_card(card).await {
                Ok(_) => summary.saved += 1,
                Err(e) => {
                    log::warn!("Skipping card '{}' ({}): {}", card.id, card.name, e);
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "Normalised card export: {} saved, {} failed",
            summary.saved,
            summary.failed
        );
        summary
    }
}
