use time::OffsetDateTime;
use uuid::Uuid;

use strata_domain::{Item, ItemVector};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
	pub item_id: Uuid,
	pub category: String,
	pub project: String,
	pub summary: String,
	pub content: String,
	pub rationale: Option<String>,
	pub alternatives: Vec<String>,
	pub tags: Vec<String>,
	pub related_refs: Vec<String>,
	pub verified: bool,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub access_count: i64,
	pub first_accessed_at: Option<OffsetDateTime>,
	pub last_accessed_at: Option<OffsetDateTime>,
	pub embedding_model: Option<String>,
}
impl TryFrom<ItemRow> for Item {
	type Error = Error;

	fn try_from(row: ItemRow) -> Result<Self> {
		Ok(Self {
			id: row.item_id,
			category: row.category.parse()?,
			project: row.project,
			summary: row.summary,
			content: row.content,
			rationale: row.rationale,
			alternatives: row.alternatives,
			tags: row.tags,
			related_refs: row.related_refs,
			verified: row.verified,
			created_at: row.created_at,
			updated_at: row.updated_at,
			access_count: row.access_count,
			first_accessed_at: row.first_accessed_at,
			last_accessed_at: row.last_accessed_at,
			embedding_model: row.embedding_model,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemVectorRow {
	#[sqlx(flatten)]
	pub item: ItemRow,
	pub vec: Vec<f32>,
}
impl TryFrom<ItemVectorRow> for ItemVector {
	type Error = Error;

	fn try_from(row: ItemVectorRow) -> Result<Self> {
		Ok(Self { item: row.item.try_into()?, vector: row.vec })
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryCount {
	pub category: String,
	pub count: i64,
}

pub fn items_from_rows(rows: Vec<ItemRow>) -> Result<Vec<Item>> {
	rows.into_iter().map(Item::try_from).collect()
}
