use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    actions::reference::{resolve_all, ReferenceEntity},
    error::{QueryError, Result},
    pagination::{Page, Pagination},
    schema::{
        Label, Photo, PhotoEntity, PhotoRow, Recipe, RecipeIngredient, RecipeIngredientRow,
        RecipeRow, Step, StepRow, Uuid,
    },
};

const RECIPE_COLUMNS: &str = "uuid, name, description, cook_time, prep_time, servings, url, \
     main_photo_id, in_meal_plan, created_at, updated_at, archived_at";

/// Rejects aggregates the store cannot hold before anything is written.
fn check_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.name.trim().is_empty() {
        return Err(QueryError::invalid("recipe name is empty"));
    }

    if let Some(position) = recipe
        .steps
        .iter()
        .position(|step| step.description.trim().is_empty())
    {
        return Err(QueryError::invalid(&format!(
            "step {} has no description",
            position + 1
        )));
    }

    if recipe.steps.len() > i16::MAX as usize {
        return Err(QueryError::invalid("too many steps"));
    }

    Ok(())
}

fn persisted_id(uuid: Option<Uuid>, kind: &str) -> Result<Uuid> {
    uuid.ok_or_else(|| QueryError::invalid(&format!("{kind} row has no id")))
}

/// Escapes LIKE wildcards so the search term is matched literally.
fn search_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn insert_photo(
    url: &str,
    entity: PhotoEntity,
    entity_id: Uuid,
    position: i32,
    conn: &mut PgConnection,
) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "
        INSERT INTO photos (uuid, url, entity_type, entity_id, position)
        VALUES ($1, $2, $3, $4, $5)
    ",
    )
    .bind(id)
    .bind(url)
    .bind(entity)
    .bind(entity_id)
    .bind(position)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

async fn insert_main_photo(
    recipe_id: Uuid,
    recipe: &Recipe,
    conn: &mut PgConnection,
) -> Result<Option<Uuid>> {
    match recipe.main_photo.as_ref().map(|photo| photo.url.trim()) {
        Some(url) if !url.is_empty() => {
            let id = insert_photo(url, PhotoEntity::Recipe, recipe_id, 0, conn).await?;
            Ok(Some(id))
        }
        _ => Ok(None),
    }
}

fn resolved<'r, T: ReferenceEntity>(
    rows: &'r HashMap<String, T>,
    candidate: &T,
) -> Result<&'r T> {
    rows.get(&candidate.key()).ok_or_else(|| {
        QueryError::invalid(&format!("{} '{}' was not resolved", T::KIND, candidate.key()))
    })
}

/// Writes steps, ingredient links, label links and extra photos in input order. Reference rows
/// are resolved before any link is written.
async fn write_children(recipe_id: Uuid, recipe: &Recipe, conn: &mut PgConnection) -> Result<()> {
    for (position, step) in recipe.steps.iter().enumerate() {
        let step_id = Uuid::new_v4();

        sqlx::query(
            "
            INSERT INTO steps (uuid, recipe_id, step_order, description)
            VALUES ($1, $2, $3, $4)
        ",
        )
        .bind(step_id)
        .bind(recipe_id)
        .bind((position + 1) as i16)
        .bind(step.description.trim())
        .execute(&mut *conn)
        .await?;

        for (photo_position, photo) in step.photos.iter().enumerate() {
            let url = photo.url.trim();
            if url.is_empty() {
                continue;
            }
            insert_photo(url, PhotoEntity::Step, step_id, photo_position as i32, conn).await?;
        }
    }

    let named_units = recipe
        .ingredients
        .iter()
        .filter_map(|part| part.unit.as_ref())
        .filter(|unit| !unit.name.trim().is_empty());

    let ingredients = resolve_all(
        recipe.ingredients.iter().map(|part| &part.ingredient),
        conn,
    )
    .await?;
    let units = resolve_all(named_units, conn).await?;
    let labels = resolve_all(&recipe.labels, conn).await?;

    let mut seen = HashSet::new();
    for (position, part) in recipe.ingredients.iter().enumerate() {
        let ingredient = resolved(&ingredients, &part.ingredient)?;
        let ingredient_id = persisted_id(ingredient.uuid, "ingredient")?;

        // First occurrence wins
        if !seen.insert(ingredient_id) {
            log::debug!(
                "Skipping repeated ingredient '{}' in recipe {}",
                ingredient.name,
                recipe_id
            );
            continue;
        }

        let unit_id = match &part.unit {
            Some(unit) if !unit.name.trim().is_empty() => {
                Some(persisted_id(resolved(&units, unit)?.uuid, "unit")?)
            }
            _ => None,
        };

        sqlx::query(
            "
            INSERT INTO recipe_ingredient
                (recipe_id, ingredient_id, unit_id, quantity, preparation, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(unit_id)
        .bind(part.quantity)
        .bind(part.preparation.trim())
        .bind(part.notes.trim())
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }

    for label in &recipe.labels {
        sqlx::query(
            "INSERT INTO recipe_label (recipe_id, label_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(persisted_id(resolved(&labels, label)?.uuid, "label")?)
        .execute(&mut *conn)
        .await?;
    }

    let main_url = recipe.main_photo.as_ref().map(|photo| photo.url.trim());
    let mut photo_position = 1;
    for photo in &recipe.photos {
        let url = photo.url.trim();
        if url.is_empty() || Some(url) == main_url {
            continue;
        }
        insert_photo(url, PhotoEntity::Recipe, recipe_id, photo_position, conn).await?;
        photo_position += 1;
    }

    Ok(())
}

async fn clear_children(recipe_id: Uuid, conn: &mut PgConnection) -> Result<()> {
    sqlx::query(
        "
        DELETE FROM photos
        WHERE entity_type = $2 AND entity_id IN (SELECT uuid FROM steps WHERE recipe_id = $1)
    ",
    )
    .bind(recipe_id)
    .bind(PhotoEntity::Step)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM photos WHERE entity_type = $2 AND entity_id = $1")
        .bind(recipe_id)
        .bind(PhotoEntity::Recipe)
        .execute(&mut *conn)
        .await?;

    for table in ["steps", "recipe_ingredient", "recipe_label"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(recipe_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Rebuilds the full aggregate for a recipe row. Every read path goes through here.
async fn load_aggregate(row: RecipeRow, conn: &mut PgConnection) -> Result<Recipe> {
    let step_rows: Vec<StepRow> = sqlx::query_as(
        "SELECT uuid, step_order, description FROM steps WHERE recipe_id = $1 ORDER BY step_order",
    )
    .bind(row.uuid)
    .fetch_all(&mut *conn)
    .await?;

    let step_photos: Vec<PhotoRow> = sqlx::query_as(
        "
        SELECT p.uuid, p.url, p.entity_id
        FROM photos p
        INNER JOIN steps s ON s.uuid = p.entity_id
        WHERE p.entity_type = $2 AND s.recipe_id = $1
        ORDER BY p.position, p.created_at
    ",
    )
    .bind(row.uuid)
    .bind(PhotoEntity::Step)
    .fetch_all(&mut *conn)
    .await?;

    let mut photos_by_step: HashMap<Uuid, Vec<Photo>> = HashMap::new();
    for photo in step_photos {
        photos_by_step
            .entry(photo.entity_id)
            .or_default()
            .push(photo.into());
    }

    let steps = step_rows
        .into_iter()
        .map(|step| Step {
            uuid: Some(step.uuid),
            order: step.step_order,
            description: step.description,
            photos: photos_by_step.remove(&step.uuid).unwrap_or_default(),
        })
        .collect();

    let ingredients: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT i.uuid AS ingredient_uuid, i.name AS ingredient_name,
               u.uuid AS unit_uuid, u.name AS unit_name, u.abbreviation AS unit_abbreviation,
               ri.quantity, ri.preparation, ri.notes
        FROM recipe_ingredient ri
        INNER JOIN ingredients i ON i.uuid = ri.ingredient_id
        LEFT JOIN units u ON u.uuid = ri.unit_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.position
    ",
    )
    .bind(row.uuid)
    .fetch_all(&mut *conn)
    .await?;

    let labels: Vec<Label> = sqlx::query_as(
        "
        SELECT l.uuid, l.name, l.color
        FROM labels l
        INNER JOIN recipe_label rl ON rl.label_id = l.uuid
        WHERE rl.recipe_id = $1
        ORDER BY l.name
    ",
    )
    .bind(row.uuid)
    .fetch_all(&mut *conn)
    .await?;

    let recipe_photos: Vec<PhotoRow> = sqlx::query_as(
        "
        SELECT uuid, url, entity_id
        FROM photos
        WHERE entity_type = $2 AND entity_id = $1
        ORDER BY position, created_at
    ",
    )
    .bind(row.uuid)
    .bind(PhotoEntity::Recipe)
    .fetch_all(&mut *conn)
    .await?;

    let (main_photo, photos): (Vec<PhotoRow>, Vec<PhotoRow>) = recipe_photos
        .into_iter()
        .partition(|photo| Some(photo.uuid) == row.main_photo_id);

    Ok(Recipe {
        uuid: Some(row.uuid),
        name: row.name,
        description: row.description,
        cook_time: row.cook_time,
        prep_time: row.prep_time,
        servings: row.servings,
        url: row.url,
        main_photo: main_photo.into_iter().next().map(Photo::from),
        steps,
        ingredients: ingredients.into_iter().map(RecipeIngredient::from).collect(),
        labels,
        photos: photos.into_iter().map(Photo::from).collect(),
        in_meal_plan: row.in_meal_plan,
        created_at: Some(row.created_at),
        updated_at: Some(row.updated_at),
        archived_at: row.archived_at,
    })
}

async fn load_all(rows: Vec<RecipeRow>, pool: &Pool<Postgres>) -> Result<Vec<Recipe>> {
    let mut conn = pool.acquire().await?;
    let mut recipes = Vec::with_capacity(rows.len());
    for row in rows {
        recipes.push(load_aggregate(row, &mut conn).await?);
    }

    Ok(recipes)
}

/// Writes the recipe and everything it owns in one transaction. Ingredients, units and labels
/// are resolved by name; an ingredient repeated within the recipe is linked once.
pub async fn save_recipe(recipe: Recipe, pool: &Pool<Postgres>) -> Result<Recipe> {
    check_recipe(&recipe)?;

    let mut tr = pool.begin().await?;
    let id = recipe.uuid.unwrap_or_else(Uuid::new_v4);
    let now = Utc::now();

    let main_photo_id = insert_main_photo(id, &recipe, &mut tr).await?;

    let row: RecipeRow = sqlx::query_as(&format!(
        "
        INSERT INTO recipes
            (uuid, name, description, cook_time, prep_time, servings, url, main_photo_id,
             in_meal_plan, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
        RETURNING {RECIPE_COLUMNS}
    "
    ))
    .bind(id)
    .bind(recipe.name.trim())
    .bind(recipe.description.trim())
    .bind(recipe.cook_time)
    .bind(recipe.prep_time)
    .bind(recipe.servings)
    .bind(recipe.url.trim())
    .bind(main_photo_id)
    .bind(recipe.in_meal_plan)
    .bind(now)
    .fetch_one(&mut *tr)
    .await?;

    write_children(id, &recipe, &mut tr).await?;
    let saved = load_aggregate(row, &mut tr).await?;

    tr.commit().await?;
    log::info!("Saved recipe '{}' ({})", saved.name, id);

    Ok(saved)
}

/// Active recipes only.
pub async fn get_recipe_by_id(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>> {
    let mut conn = pool.acquire().await?;

    let row: Option<RecipeRow> = sqlx::query_as(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE uuid = $1 AND archived_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load_aggregate(row, &mut conn).await?)),
        None => Ok(None),
    }
}

/// Active recipes whose name or description contains `search`, newest first.
pub async fn list_recipes(
    pagination: Pagination,
    search: &str,
    pool: &Pool<Postgres>,
) -> Result<Page<Recipe>> {
    let pattern = search_pattern(search);

    let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
        "
        SELECT {RECIPE_COLUMNS}
        FROM recipes
        WHERE archived_at IS NULL AND (name ILIKE $1 OR description ILIKE $1)
        ORDER BY created_at DESC, uuid
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(&pattern)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM recipes WHERE archived_at IS NULL AND (name ILIKE $1 OR description ILIKE $1)",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let recipes = load_all(rows, pool).await?;
    Ok(Page::from_rows(recipes, total.0, pagination))
}

async fn lock_active(id: Uuid, conn: &mut PgConnection) -> Result<RecipeRow> {
    let row: Option<RecipeRow> = sqlx::query_as(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE uuid = $1 AND archived_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or(QueryError::RecipeNotFound { id })
}

/// Rewrites a locked recipe row and everything it owns.
async fn replace_aggregate(id: Uuid, recipe: &Recipe, conn: &mut PgConnection) -> Result<Recipe> {
    clear_children(id, conn).await?;
    let main_photo_id = insert_main_photo(id, recipe, conn).await?;

    let row: RecipeRow = sqlx::query_as(&format!(
        "
        UPDATE recipes
        SET name = $2, description = $3, cook_time = $4, prep_time = $5, servings = $6,
            url = $7, main_photo_id = $8, updated_at = $9
        WHERE uuid = $1
        RETURNING {RECIPE_COLUMNS}
    "
    ))
    .bind(id)
    .bind(recipe.name.trim())
    .bind(recipe.description.trim())
    .bind(recipe.cook_time)
    .bind(recipe.prep_time)
    .bind(recipe.servings)
    .bind(recipe.url.trim())
    .bind(main_photo_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    write_children(id, recipe, conn).await?;
    load_aggregate(row, conn).await
}

/// Replaces the stored aggregate with `recipe`. Meal plan membership is left as it is.
pub async fn update_recipe(id: Uuid, recipe: Recipe, pool: &Pool<Postgres>) -> Result<Recipe> {
    check_recipe(&recipe)?;

    let mut tr = pool.begin().await?;
    lock_active(id, &mut tr).await?;
    let updated = replace_aggregate(id, &recipe, &mut tr).await?;

    tr.commit().await?;
    log::info!("Updated recipe '{}' ({})", updated.name, id);

    Ok(updated)
}

/// Read-modify-write of one recipe. The stored aggregate is read under a row lock and handed to
/// `change`; its result replaces the aggregate in the same transaction. An error from `change`
/// rolls everything back.
pub async fn modify_recipe<F, E>(
    id: Uuid,
    change: F,
    pool: &Pool<Postgres>,
) -> std::result::Result<Recipe, E>
where
    F: FnOnce(Recipe) -> std::result::Result<Recipe, E>,
    E: From<QueryError>,
{
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let row = lock_active(id, &mut tr).await?;
    let existing = load_aggregate(row, &mut tr).await?;

    let recipe = change(existing)?;
    check_recipe(&recipe)?;
    let updated = replace_aggregate(id, &recipe, &mut tr).await?;

    tr.commit().await.map_err(QueryError::from)?;
    log::info!("Updated recipe '{}' ({})", updated.name, id);

    Ok(updated)
}

pub async fn archive_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<()> {
    let result = sqlx::query(
        "UPDATE recipes SET archived_at = $2, updated_at = $2 WHERE uuid = $1 AND archived_at IS NULL",
    )
    .bind(id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(QueryError::RecipeNotFound { id });
    }

    log::info!("Archived recipe {}", id);
    Ok(())
}

pub async fn restore_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Recipe> {
    let mut tr = pool.begin().await?;

    let row: Option<RecipeRow> = sqlx::query_as(&format!(
        "
        UPDATE recipes SET archived_at = NULL, updated_at = $2
        WHERE uuid = $1 AND archived_at IS NOT NULL
        RETURNING {RECIPE_COLUMNS}
    "
    ))
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(&mut *tr)
    .await?;

    let row = row.ok_or(QueryError::ArchivedRecipeNotFound { id })?;
    let restored = load_aggregate(row, &mut tr).await?;

    tr.commit().await?;
    log::info!("Restored recipe '{}' ({})", restored.name, id);

    Ok(restored)
}

pub async fn list_archived_recipes(
    pagination: Pagination,
    pool: &Pool<Postgres>,
) -> Result<Page<Recipe>> {
    let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
        "
        SELECT {RECIPE_COLUMNS}
        FROM recipes
        WHERE archived_at IS NOT NULL
        ORDER BY created_at DESC, uuid
        LIMIT $1 OFFSET $2
    "
    ))
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE archived_at IS NOT NULL")
            .fetch_one(pool)
            .await?;

    let recipes = load_all(rows, pool).await?;
    Ok(Page::from_rows(recipes, total.0, pagination))
}

async fn set_meal_plan(id: Uuid, in_meal_plan: bool, pool: &Pool<Postgres>) -> Result<()> {
    let result = sqlx::query(
        "
        UPDATE recipes SET in_meal_plan = $2, updated_at = $3
        WHERE uuid = $1 AND archived_at IS NULL
    ",
    )
    .bind(id)
    .bind(in_meal_plan)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(QueryError::RecipeNotFound { id });
    }

    Ok(())
}

pub async fn add_to_meal_plan(id: Uuid, pool: &Pool<Postgres>) -> Result<()> {
    set_meal_plan(id, true, pool).await
}

pub async fn remove_from_meal_plan(id: Uuid, pool: &Pool<Postgres>) -> Result<()> {
    set_meal_plan(id, false, pool).await
}

pub async fn list_meal_plan_recipes(pool: &Pool<Postgres>) -> Result<Vec<Recipe>> {
    let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
        "
        SELECT {RECIPE_COLUMNS}
        FROM recipes
        WHERE in_meal_plan AND archived_at IS NULL
        ORDER BY name, uuid
    "
    ))
    .fetch_all(pool)
    .await?;

    load_all(rows, pool).await
}
