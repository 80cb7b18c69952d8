pub mod retrieve;
pub mod store;
pub mod usage;

mod error;

pub use error::{Error, Result};
pub use retrieve::{RetrieveOptions, RetrieveRequest, Tier1Context, TieredRetrievalResult};
pub use store::{MemoryStore, PgRecordStore};
pub use usage::{UsageStats, UsageTracker};

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use strata_config::{Config, EmbeddingProviderConfig};
use strata_domain::{Category, Item, ItemVector, ProjectFingerprint};
use strata_providers::embedding;
use strata_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// The persistent item collection the pipeline reads from.
///
/// Implementations only need to be consistent per call; the pipeline never holds a transaction
/// across operations.
pub trait RecordStore
where
	Self: Send + Sync,
{
	fn aggregate_fingerprint<'a>(
		&'a self,
		project: Option<&'a str>,
		top_n: u32,
	) -> BoxFuture<'a, Result<ProjectFingerprint>>;

	fn recent_high_value_items<'a>(
		&'a self,
		project: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>>;

	fn items_with_vectors<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
	) -> BoxFuture<'a, Result<Vec<ItemVector>>>;

	fn recent_items<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Item>>>;

	fn item_by_id<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<Item>>>;

	/// Best effort. Resolves to `false` when the id is unknown.
	fn record_access<'a>(&'a self, item_id: Uuid, now: OffsetDateTime)
	-> BoxFuture<'a, Result<bool>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

pub struct StrataService {
	pub cfg: Config,
	pub store: Arc<dyn RecordStore>,
	pub providers: Providers,
	pub usage: UsageTracker,
}
impl StrataService {
	/// Must be called inside a Tokio runtime when usage tracking is enabled, since the tracker
	/// spawns its worker here.
	pub fn new(cfg: Config, db: Db) -> Self {
		let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(db));
		let usage = if cfg.usage_tracking.enabled {
			UsageTracker::spawn(store.clone(), cfg.usage_tracking.queue_capacity)
		} else {
			UsageTracker::disabled()
		};

		Self::with_backends(cfg, store, Providers::default(), usage)
	}

	pub fn with_backends(
		cfg: Config,
		store: Arc<dyn RecordStore>,
		providers: Providers,
		usage: UsageTracker,
	) -> Self {
		Self { cfg, store, providers, usage }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
