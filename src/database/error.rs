use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the recipe store.
///
/// Not-found conditions are typed so callers can match on them; storage failures are carried
/// unchanged in [`QueryError::Database`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("recipe with ID {id} not found")]
    RecipeNotFound { id: Uuid },

    #[error("archived recipe with ID {id} not found")]
    ArchivedRecipeNotFound { id: Uuid },

    #[error("invalid recipe: {reason}")]
    InvalidRecipe { reason: String },

    /// A unique constraint rejected an insert. The reference resolver recovers from this
    /// internally; other writers propagate it.
    #[error("unique constraint violation ({})", .constraint.as_deref().unwrap_or("unknown constraint"))]
    Conflict {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error("{kind} '{name}' could not be resolved after {attempts} attempts")]
    Unresolved {
        kind: &'static str,
        name: String,
        attempts: usize,
    },

    #[error(transparent)]
    Database(sqlx::Error),
}

impl QueryError {
    pub fn invalid(reason: &str) -> Self {
        Self::InvalidRecipe {
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RecipeNotFound { .. } | Self::ArchivedRecipeNotFound { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::Database(e) if e.is_unique_violation() => Self::Conflict {
                constraint: e.constraint().map(str::to_string),
                table: e.table().map(str::to_string),
                message: e.message().to_string(),
            },
            _ => Self::Database(value),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
