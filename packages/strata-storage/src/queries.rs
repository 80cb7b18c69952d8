use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use strata_domain::{Category, Item, ItemVector, ProjectFingerprint};

use crate::{
	Error, Result,
	db::Db,
	models::{self, CategoryCount, ItemRow, ItemVectorRow},
};

const ITEM_SELECT: &str = "\
SELECT
	i.item_id,
	i.category,
	i.project,
	i.summary,
	i.content,
	i.rationale,
	i.alternatives,
	i.tags,
	i.related_refs,
	i.verified,
	i.created_at,
	i.updated_at,
	i.access_count,
	i.first_accessed_at,
	i.last_accessed_at,
	e.model AS embedding_model
FROM items i
LEFT JOIN item_embeddings e ON e.item_id = i.item_id";

pub async fn insert_item(db: &Db, item: &Item) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO items (
	item_id,
	category,
	project,
	summary,
	content,
	rationale,
	alternatives,
	tags,
	related_refs,
	verified,
	created_at,
	updated_at,
	access_count,
	first_accessed_at,
	last_accessed_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
	)
	.bind(item.id)
	.bind(item.category.as_str())
	.bind(item.project.as_str())
	.bind(item.summary.as_str())
	.bind(item.content.as_str())
	.bind(item.rationale.as_deref())
	.bind(&item.alternatives)
	.bind(&item.tags)
	.bind(&item.related_refs)
	.bind(item.verified)
	.bind(item.created_at)
	.bind(item.updated_at)
	.bind(item.access_count)
	.bind(item.first_accessed_at)
	.bind(item.last_accessed_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_item_embedding(
	db: &Db,
	item_id: Uuid,
	model: &str,
	vec: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	if vec.is_empty() {
		return Err(Error::InvalidArgument("Embedding vector must be non-empty.".to_string()));
	}

	let dim = i32::try_from(vec.len())
		.map_err(|_| Error::InvalidArgument("Embedding vector is too large.".to_string()))?;

	sqlx::query(
		"\
INSERT INTO item_embeddings (item_id, model, embedding_dim, vec, created_at)
VALUES ($1,$2,$3,$4,$5)
ON CONFLICT (item_id) DO UPDATE
SET
	model = EXCLUDED.model,
	embedding_dim = EXCLUDED.embedding_dim,
	vec = EXCLUDED.vec,
	created_at = EXCLUDED.created_at",
	)
	.bind(item_id)
	.bind(model)
	.bind(dim)
	.bind(vec)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn item_by_id(db: &Db, item_id: Uuid) -> Result<Option<Item>> {
	let sql = format!("{ITEM_SELECT}\nWHERE i.item_id = $1");
	let row: Option<ItemRow> =
		sqlx::query_as(&sql).bind(item_id).fetch_optional(&db.pool).await?;

	row.map(Item::try_from).transpose()
}

pub async fn count_by_category(
	db: &Db,
	project: Option<&str>,
) -> Result<BTreeMap<Category, u64>> {
	let rows: Vec<CategoryCount> = sqlx::query_as(
		"\
SELECT category, count(*) AS count
FROM items
WHERE ($1::text IS NULL OR project = $1)
GROUP BY category",
	)
	.bind(project)
	.fetch_all(&db.pool)
	.await?;
	let mut counts = BTreeMap::new();

	for row in rows {
		let category: Category = row.category.parse()?;

		counts.insert(category, u64::try_from(row.count).unwrap_or(0));
	}

	Ok(counts)
}

/// Most-accessed items first. Items that were never accessed are not listed.
pub async fn top_accessed_items(db: &Db, project: Option<&str>, limit: u32) -> Result<Vec<Item>> {
	let sql = format!(
		"{ITEM_SELECT}
WHERE ($1::text IS NULL OR i.project = $1)
	AND i.access_count > 0
ORDER BY i.access_count DESC, i.last_accessed_at DESC NULLS LAST, i.item_id
LIMIT $2"
	);
	let rows: Vec<ItemRow> = sqlx::query_as(&sql)
		.bind(project)
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	models::items_from_rows(rows)
}

/// Newest first, optionally restricted to one category.
pub async fn recent_items(
	db: &Db,
	project: Option<&str>,
	category: Option<Category>,
	limit: u32,
) -> Result<Vec<Item>> {
	let sql = format!(
		"{ITEM_SELECT}
WHERE ($1::text IS NULL OR i.project = $1)
	AND ($2::text IS NULL OR i.category = $2)
ORDER BY i.created_at DESC, i.item_id
LIMIT $3"
	);
	let rows: Vec<ItemRow> = sqlx::query_as(&sql)
		.bind(project)
		.bind(category.map(Category::as_str))
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	models::items_from_rows(rows)
}

pub async fn recent_high_value_items(
	db: &Db,
	project: Option<&str>,
	limit: u32,
) -> Result<Vec<Item>> {
	recent_items(db, project, Some(Category::Win), limit).await
}

pub async fn items_with_vectors(
	db: &Db,
	project: Option<&str>,
	category: Option<Category>,
) -> Result<Vec<ItemVector>> {
	let sql = format!(
		"\
SELECT
	i.item_id,
	i.category,
	i.project,
	i.summary,
	i.content,
	i.rationale,
	i.alternatives,
	i.tags,
	i.related_refs,
	i.verified,
	i.created_at,
	i.updated_at,
	i.access_count,
	i.first_accessed_at,
	i.last_accessed_at,
	e.model AS embedding_model,
	e.vec
FROM items i
JOIN item_embeddings e ON e.item_id = i.item_id
WHERE ($1::text IS NULL OR i.project = $1)
	AND ($2::text IS NULL OR i.category = $2)
ORDER BY i.created_at DESC, i.item_id"
	);
	let rows: Vec<ItemVectorRow> = sqlx::query_as(&sql)
		.bind(project)
		.bind(category.map(Category::as_str))
		.fetch_all(&db.pool)
		.await?;

	rows.into_iter().map(ItemVector::try_from).collect()
}

pub async fn aggregate_fingerprint(
	db: &Db,
	project: Option<&str>,
	top_n: u32,
) -> Result<ProjectFingerprint> {
	let by_category = count_by_category(db, project).await?;
	let total_items = by_category.values().sum();
	let top_accessed = top_accessed_items(db, project, top_n).await?;
	let most_recent = recent_items(db, project, None, top_n).await?;

	Ok(ProjectFingerprint { total_items, by_category, top_accessed, most_recent })
}

/// Returns false when no item has the given id.
pub async fn record_access(db: &Db, item_id: Uuid, now: OffsetDateTime) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE items
SET
	access_count = access_count + 1,
	first_accessed_at = COALESCE(first_accessed_at, $1),
	last_accessed_at = $1
WHERE item_id = $2",
	)
	.bind(now)
	.bind(item_id)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		tracing::debug!(%item_id, "Access recorded for unknown item.");
	}

	Ok(result.rows_affected() > 0)
}
