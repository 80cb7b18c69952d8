use std::{
	collections::BTreeMap,
	sync::{Mutex, MutexGuard, PoisonError},
};

use time::OffsetDateTime;
use uuid::Uuid;

use strata_domain::{Category, Item, ItemVector, ProjectFingerprint};
use strata_storage::{db::Db, queries};

use crate::{BoxFuture, RecordStore, Result};

/// Postgres-backed record store.
pub struct PgRecordStore {
	db: Db,
}
impl PgRecordStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}
}
impl RecordStore for PgRecordStore {
	fn aggregate_fingerprint<'a>(
		&'a self,
		project: Option<&'a str>,
		top_n: u32,
	) -> BoxFuture<'a, Result<ProjectFingerprint>> {
		Box::pin(async move { Ok(queries::aggregate_fingerprint(&self.db, project, top_n).await?) })
	}

	fn recent_high_value_items<'a>(
		&'a self,
		project: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(queries::recent_high_value_items(&self.db, project, limit).await?) })
	}

	fn items_with_vectors<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
	) -> BoxFuture<'a, Result<Vec<ItemVector>>> {
		Box::pin(async move { Ok(queries::items_with_vectors(&self.db, project, category).await?) })
	}

	fn recent_items<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(queries::recent_items(&self.db, project, category, limit).await?) })
	}

	fn item_by_id<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move { Ok(queries::item_by_id(&self.db, item_id).await?) })
	}

	fn record_access<'a>(
		&'a self,
		item_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::record_access(&self.db, item_id, now).await?) })
	}
}

/// Process-local record store.
///
/// Follows the same ordering rules as the Postgres queries: newest first with ties broken by id,
/// and most-accessed first for the fingerprint. Useful for tests and for embedding the pipeline
/// without a database.
#[derive(Default)]
pub struct MemoryStore {
	records: Mutex<Vec<MemoryRecord>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces an item. Items without a vector are only reachable by recency.
	pub fn insert(&self, item: Item, vector: Option<Vec<f32>>) {
		let mut records = self.lock();

		records.retain(|record| record.item.id != item.id);
		records.push(MemoryRecord { item, vector });
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn get(&self, item_id: Uuid) -> Option<Item> {
		self.lock().iter().find(|record| record.item.id == item_id).map(|record| record.item.clone())
	}

	fn lock(&self) -> MutexGuard<'_, Vec<MemoryRecord>> {
		self.records.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn matching(&self, project: Option<&str>, category: Option<Category>) -> Vec<MemoryRecord> {
		let mut records: Vec<MemoryRecord> = self
			.lock()
			.iter()
			.filter(|record| project.is_none_or(|project| record.item.project == project))
			.filter(|record| category.is_none_or(|category| record.item.category == category))
			.cloned()
			.collect();

		records.sort_by(|a, b| {
			b.item.created_at.cmp(&a.item.created_at).then_with(|| a.item.id.cmp(&b.item.id))
		});

		records
	}

	fn recent(&self, project: Option<&str>, category: Option<Category>, limit: u32) -> Vec<Item> {
		self.matching(project, category)
			.into_iter()
			.take(limit as usize)
			.map(|record| record.item)
			.collect()
	}
}
impl RecordStore for MemoryStore {
	fn aggregate_fingerprint<'a>(
		&'a self,
		project: Option<&'a str>,
		top_n: u32,
	) -> BoxFuture<'a, Result<ProjectFingerprint>> {
		Box::pin(async move {
			let records = self.matching(project, None);
			let mut by_category = BTreeMap::new();

			for record in &records {
				*by_category.entry(record.item.category).or_insert(0_u64) += 1;
			}

			let mut accessed: Vec<Item> = records
				.iter()
				.filter(|record| record.item.access_count > 0)
				.map(|record| record.item.clone())
				.collect();

			accessed.sort_by(|a, b| {
				b.access_count
					.cmp(&a.access_count)
					.then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
					.then_with(|| a.id.cmp(&b.id))
			});
			accessed.truncate(top_n as usize);

			Ok(ProjectFingerprint {
				total_items: records.len() as u64,
				by_category,
				top_accessed: accessed,
				most_recent: records.into_iter().take(top_n as usize).map(|r| r.item).collect(),
			})
		})
	}

	fn recent_high_value_items<'a>(
		&'a self,
		project: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(self.recent(project, Some(Category::Win), limit)) })
	}

	fn items_with_vectors<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
	) -> BoxFuture<'a, Result<Vec<ItemVector>>> {
		Box::pin(async move {
			Ok(self
				.matching(project, category)
				.into_iter()
				.filter_map(|record| {
					record.vector.map(|vector| ItemVector { item: record.item, vector })
				})
				.collect())
		})
	}

	fn recent_items<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(self.recent(project, category, limit)) })
	}

	fn item_by_id<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move { Ok(self.get(item_id)) })
	}

	fn record_access<'a>(
		&'a self,
		item_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut records = self.lock();
			let Some(record) = records.iter_mut().find(|record| record.item.id == item_id) else {
				return Ok(false);
			};
			let item = &mut record.item;

			item.access_count += 1;
			item.first_accessed_at.get_or_insert(now);
			item.last_accessed_at = Some(now);

			Ok(true)
		})
	}
}

#[derive(Clone)]
struct MemoryRecord {
	item: Item,
	vector: Option<Vec<f32>>,
}
