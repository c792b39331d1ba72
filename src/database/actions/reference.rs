//! Get-or-create for the shared reference tables (ingredients, units, labels).
//!
//! Two transactions can both miss a name on lookup and both try to insert it. The insert runs
//! inside a savepoint; the loser's unique violation is rolled back to that savepoint and the
//! lookup is repeated, which then sees the winner's committed row.
//!
//! A recipe resolves all of its names through [`resolve_all`], in kind then key order. Writers
//! that introduce overlapping new names therefore wait on each other's uncommitted rows in one
//! global order and never form a lock cycle.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    constants::{DEFAULT_LABEL_COLOR, MAX_RESOLVE_ATTEMPTS},
    error::{QueryError, Result},
    schema::{Ingredient, Label, Unit},
};

#[async_trait]
pub trait ReferenceEntity: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + Sized {
    const KIND: &'static str;
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    /// Normalized name the table is unique on.
    fn key(&self) -> String;

    async fn insert(&self, id: Uuid, key: &str, conn: &mut PgConnection) -> Result<Self>;
}

#[async_trait]
impl ReferenceEntity for Ingredient {
    const KIND: &'static str = "ingredient";
    const TABLE: &'static str = "ingredients";
    const COLUMNS: &'static str = "uuid, name";

    fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    async fn insert(&self, id: Uuid, key: &str, conn: &mut PgConnection) -> Result<Self> {
        let row: Ingredient =
            sqlx::query_as("INSERT INTO ingredients (uuid, name) VALUES ($1, $2) RETURNING uuid, name")
                .bind(id)
                .bind(key)
                .fetch_one(&mut *conn)
                .await?;

        Ok(row)
    }
}

#[async_trait]
impl ReferenceEntity for Unit {
    const KIND: &'static str = "unit";
    const TABLE: &'static str = "units";
    const COLUMNS: &'static str = "uuid, name, abbreviation";

    fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    async fn insert(&self, id: Uuid, key: &str, conn: &mut PgConnection) -> Result<Self> {
        let row: Unit = sqlx::query_as(
            "
            INSERT INTO units (uuid, name, abbreviation)
            VALUES ($1, $2, $3)
            RETURNING uuid, name, abbreviation
        ",
        )
        .bind(id)
        .bind(key)
        .bind(self.abbreviation.trim())
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl ReferenceEntity for Label {
    const KIND: &'static str = "label";
    const TABLE: &'static str = "labels";
    const COLUMNS: &'static str = "uuid, name, color";

    fn key(&self) -> String {
        self.name.trim().to_string()
    }

    async fn insert(&self, id: Uuid, key: &str, conn: &mut PgConnection) -> Result<Self> {
        let color = match self.color.trim() {
            "" => DEFAULT_LABEL_COLOR,
            color => color,
        };

        let row: Label = sqlx::query_as(
            "
            INSERT INTO labels (uuid, name, color)
            VALUES ($1, $2, $3)
            RETURNING uuid, name, color
        ",
        )
        .bind(id)
        .bind(key)
        .bind(color)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }
}

pub async fn find_by_name<T: ReferenceEntity>(
    name: &str,
    conn: &mut PgConnection,
) -> Result<Option<T>> {
    let sql = format!("SELECT {} FROM {} WHERE name = $1", T::COLUMNS, T::TABLE);
    let row: Option<T> = sqlx::query_as(&sql)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row)
}

/// Returns the row named like `candidate`, inserting it first if needed. The flag tells
/// whether this call created the row.
pub async fn get_or_create<T: ReferenceEntity>(
    candidate: &T,
    conn: &mut PgConnection,
) -> Result<(T, bool)> {
    let key = candidate.key();
    if key.is_empty() {
        return Err(QueryError::invalid(&format!("{} name is empty", T::KIND)));
    }

    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(existing) = find_by_name::<T>(&key, &mut *conn).await? {
            return Ok((existing, false));
        }

        let mut savepoint = conn.begin().await?;
        match candidate.insert(Uuid::new_v4(), &key, &mut *savepoint).await {
            Ok(created) => {
                savepoint.commit().await?;
                log::debug!("Created {} '{}'", T::KIND, key);
                return Ok((created, true));
            }
            Err(QueryError::Conflict { .. }) => {
                savepoint.rollback().await?;
                log::warn!(
                    "Concurrent insert of {} '{}' won the race (attempt {}), looking it up again",
                    T::KIND,
                    key,
                    attempt
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(QueryError::Unresolved {
        kind: T::KIND,
        name: key,
        attempts: MAX_RESOLVE_ATTEMPTS,
    })
}

/// Resolves every distinct name among `candidates` in ascending key order. The first candidate
/// with a given key decides the attributes of a newly created row. The result is keyed by
/// [`ReferenceEntity::key`].
pub async fn resolve_all<'c, T: ReferenceEntity + 'c>(
    candidates: impl IntoIterator<Item = &'c T>,
    conn: &mut PgConnection,
) -> Result<HashMap<String, T>> {
    let mut ordered: BTreeMap<String, &T> = BTreeMap::new();
    for candidate in candidates {
        ordered.entry(candidate.key()).or_insert(candidate);
    }

    let mut resolved = HashMap::with_capacity(ordered.len());
    for (key, candidate) in ordered {
        let (row, _) = get_or_create(candidate, &mut *conn).await?;
        resolved.insert(key, row);
    }

    Ok(resolved)
}

pub async fn list_reference<T: ReferenceEntity>(pool: &Pool<Postgres>) -> Result<Vec<T>> {
    let sql = format!("SELECT {} FROM {} ORDER BY name", T::COLUMNS, T::TABLE);
    let rows: Vec<T> = sqlx::query_as(&sql).fetch_all(pool).await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::PgPool;

    use super::*;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[sqlx::test]
    async fn creates_once_then_finds(pool: PgPool) {
        init_logging();
        let mut conn = pool.acquire().await.unwrap();

        let (first, created) = get_or_create(&Ingredient::named("  Basil "), &mut *conn)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.name, "basil");
        assert!(first.uuid.is_some());

        let (second, created) = get_or_create(&Ingredient::named("BASIL"), &mut *conn)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second, first);
    }

    #[sqlx::test]
    async fn units_keep_their_abbreviation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let (unit, _) = get_or_create(&Unit::named("tablespoon", "tbsp"), &mut *conn)
            .await
            .unwrap();
        assert_eq!(unit.abbreviation, "tbsp");

        let units: Vec<Unit> = list_reference(&pool).await.unwrap();
        assert_eq!(units.len(), 1);
    }

    #[sqlx::test]
    async fn labels_default_their_color(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let (label, created) = get_or_create(&Label::named("Vegetarian", ""), &mut *conn)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(label.color, DEFAULT_LABEL_COLOR);

        let (again, created) = get_or_create(&Label::named("Vegetarian", "#ff0000"), &mut *conn)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.color, DEFAULT_LABEL_COLOR);
    }

    #[sqlx::test]
    async fn empty_names_are_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let result = get_or_create(&Ingredient::named("   "), &mut *conn).await;
        assert!(matches!(result, Err(QueryError::InvalidRecipe { .. })));
    }

    #[sqlx::test]
    async fn resolve_all_merges_names_by_key(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let candidates = [
            Ingredient::named("Thyme"),
            Ingredient::named("basil"),
            Ingredient::named(" THYME "),
        ];

        let resolved = resolve_all(&candidates, &mut *conn).await.unwrap();

        let mut keys: Vec<&str> = resolved.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["basil", "thyme"]);
        assert_eq!(resolved["thyme"].name, "thyme");

        let ingredients: Vec<Ingredient> = list_reference(&pool).await.unwrap();
        assert_eq!(ingredients.len(), 2);
    }

    #[sqlx::test]
    async fn resolve_all_reuses_rows_of_a_writer_it_waited_for(pool: PgPool) {
        init_logging();

        let forward = [Ingredient::named("anise"), Ingredient::named("mace")];
        let backward = [Ingredient::named("mace"), Ingredient::named("anise")];

        let mut first = pool.begin().await.unwrap();
        let winners = resolve_all(&forward, &mut *first).await.unwrap();

        let racing_pool = pool.clone();
        let second = tokio::spawn(async move {
            let mut second = racing_pool.begin().await.unwrap();
            let resolved = resolve_all(&backward, &mut *second).await;
            second.commit().await.unwrap();
            resolved
        });

        // The second transaction now waits on the first one's uncommitted "anise".
        tokio::time::sleep(Duration::from_millis(200)).await;
        first.commit().await.unwrap();

        let resolved = second.await.unwrap().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["anise"].uuid, winners["anise"].uuid);
        assert_eq!(resolved["mace"].uuid, winners["mace"].uuid);

        let ingredients: Vec<Ingredient> = list_reference(&pool).await.unwrap();
        assert_eq!(ingredients.len(), 2);
    }

    #[sqlx::test]
    async fn a_lost_create_race_resolves_to_the_winning_row(pool: PgPool) {
        init_logging();

        let mut first = pool.begin().await.unwrap();
        let (winner, created) = get_or_create(&Ingredient::named("saffron"), &mut *first)
            .await
            .unwrap();
        assert!(created);

        let racing_pool = pool.clone();
        let loser = tokio::spawn(async move {
            let mut second = racing_pool.begin().await.unwrap();
            let resolved = get_or_create(&Ingredient::named("Saffron"), &mut *second)
                .await
                .unwrap();
            second.commit().await.unwrap();
            resolved
        });

        // Let the second transaction block on the uncommitted row before committing.
        tokio::time::sleep(Duration::from_millis(200)).await;
        first.commit().await.unwrap();

        let (resolved, created) = loser.await.unwrap();
        assert!(!created);
        assert_eq!(resolved.uuid, winner.uuid);

        let ingredients: Vec<Ingredient> = list_reference(&pool).await.unwrap();
        assert_eq!(ingredients.len(), 1);
    }
}
