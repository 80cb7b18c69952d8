use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use color_eyre::eyre;
use serde_json::Map;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use strata_config::{
	Config, EmbeddingProviderConfig, Postgres, Providers as ProviderConfigs, Retrieval, Service,
	Storage, UsageTracking,
};
use strata_domain::{Category, Item, ItemVector, ProjectFingerprint, diversity::DiversifyStrategy};
use strata_service::{
	BoxFuture, EmbeddingProvider, Error, MemoryStore, Providers, RecordStore, RetrieveOptions,
	RetrieveRequest, StrataService, UsageTracker,
};

struct StubEmbedding {
	vectors: HashMap<String, Vec<f32>>,
}
impl StubEmbedding {
	fn new(entries: &[(&str, Vec<f32>)]) -> Self {
		Self {
			vectors: entries
				.iter()
				.map(|(text, vector)| (text.to_string(), vector.clone()))
				.collect(),
		}
	}
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			texts
				.iter()
				.map(|text| {
					self.vectors
						.get(text)
						.cloned()
						.ok_or_else(|| eyre::eyre!("No stub vector for {text:?}."))
				})
				.collect()
		})
	}
}

/// Delegates to a memory store, failing selected operations.
struct FlakyStore {
	inner: MemoryStore,
	fail_vectors: bool,
	fail_access: bool,
}
impl RecordStore for FlakyStore {
	fn aggregate_fingerprint<'a>(
		&'a self,
		project: Option<&'a str>,
		top_n: u32,
	) -> BoxFuture<'a, strata_service::Result<ProjectFingerprint>> {
		self.inner.aggregate_fingerprint(project, top_n)
	}

	fn recent_high_value_items<'a>(
		&'a self,
		project: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, strata_service::Result<Vec<Item>>> {
		self.inner.recent_high_value_items(project, limit)
	}

	fn items_with_vectors<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
	) -> BoxFuture<'a, strata_service::Result<Vec<ItemVector>>> {
		if self.fail_vectors {
			return Box::pin(async {
				Err::<Vec<ItemVector>, _>(Error::Storage {
					message: "vector table unavailable".to_string(),
				})
			});
		}

		self.inner.items_with_vectors(project, category)
	}

	fn recent_items<'a>(
		&'a self,
		project: Option<&'a str>,
		category: Option<Category>,
		limit: u32,
	) -> BoxFuture<'a, strata_service::Result<Vec<Item>>> {
		self.inner.recent_items(project, category, limit)
	}

	fn item_by_id<'a>(
		&'a self,
		item_id: Uuid,
	) -> BoxFuture<'a, strata_service::Result<Option<Item>>> {
		self.inner.item_by_id(item_id)
	}

	fn record_access<'a>(
		&'a self,
		item_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, strata_service::Result<bool>> {
		if self.fail_access {
			return Box::pin(async {
				Err::<bool, _>(Error::Storage { message: "items table is read-only".to_string() })
			});
		}

		self.inner.record_access(item_id, now)
	}
}

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: "postgres://unused".to_string(), pool_max_conns: 1 },
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1".to_string(),
				api_key: "stub".to_string(),
				path: "/embeddings".to_string(),
				model: "stub".to_string(),
				dimensions: 3,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		retrieval: Retrieval::default(),
		usage_tracking: UsageTracking::default(),
	}
}

fn item(category: Category, project: &str, age_minutes: i64, tags: &[&str]) -> Item {
	let created_at = OffsetDateTime::now_utc() - Duration::minutes(age_minutes);

	Item {
		id: Uuid::new_v4(),
		category,
		project: project.to_string(),
		summary: format!("{category} note"),
		content: format!("A short {category} record for {project}."),
		rationale: None,
		alternatives: Vec::new(),
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
		related_refs: Vec::new(),
		verified: true,
		created_at,
		updated_at: created_at,
		access_count: 0,
		first_accessed_at: None,
		last_accessed_at: None,
		embedding_model: Some("stub".to_string()),
	}
}

/// Unit vector whose cosine against `[1, 0, 0]` is `similarity`.
fn unit(similarity: f32) -> Vec<f32> {
	vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt(), 0.0]
}

fn rust_embedding() -> StubEmbedding {
	StubEmbedding::new(&[("rust", vec![1.0, 0.0, 0.0])])
}

fn service_with(store: Arc<dyn RecordStore>, embedding: StubEmbedding) -> StrataService {
	StrataService::with_backends(
		test_config(),
		store,
		Providers::new(Arc::new(embedding)),
		UsageTracker::disabled(),
	)
}

fn search_only(diversify: DiversifyStrategy) -> RetrieveOptions {
	RetrieveOptions { include_tier1: Some(false), diversify: Some(diversify), ..Default::default() }
}

fn request(query: &str, options: RetrieveOptions) -> RetrieveRequest {
	RetrieveRequest { query: query.to_string(), options }
}

fn ids(items: &[strata_domain::SearchResult]) -> Vec<Uuid> {
	items.iter().map(|result| result.item.id).collect()
}

async fn wait_until<F>(check: F) -> bool
where
	F: Fn() -> bool,
{
	for _ in 0..200 {
		if check() {
			return true;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	check()
}

#[tokio::test]
async fn empty_query_returns_recent_items_newest_first() {
	let store = Arc::new(MemoryStore::new());
	let oldest = item(Category::Win, "alpha", 30, &[]);
	let middle = item(Category::Solution, "alpha", 20, &[]);
	let newest = item(Category::Pattern, "alpha", 10, &[]);

	store.insert(oldest.clone(), Some(unit(1.0)));
	store.insert(middle.clone(), Some(unit(0.9)));
	store.insert(newest.clone(), Some(unit(0.8)));

	let service = service_with(store, rust_embedding());
	let result = service
		.retrieve(request("   ", search_only(DiversifyStrategy::None)))
		.await
		.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![newest.id, middle.id, oldest.id]);
	assert!(result.items.iter().all(|r| r.similarity == 1.0 && r.unranked));
	assert_eq!(result.tier2.as_ref().map(Vec::len), Some(3));
	assert!(result.tier1.is_none());
	assert!(result.tier3.is_none());
	assert!(!result.truncated);
}

#[tokio::test]
async fn semantic_search_ranks_by_cosine_and_applies_threshold() {
	let store = Arc::new(MemoryStore::new());
	let best = item(Category::Decision, "alpha", 30, &[]);
	let close = item(Category::Decision, "alpha", 20, &[]);
	let unrelated = item(Category::Decision, "alpha", 10, &[]);

	store.insert(close.clone(), Some(unit(0.8)));
	store.insert(unrelated.clone(), Some(vec![0.0, 1.0, 0.0]));
	store.insert(best.clone(), Some(vec![2.0, 0.0, 0.0]));

	let service = service_with(store, rust_embedding());
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![best.id, close.id]);
	assert!((result.items[0].similarity - 1.0).abs() < 1e-5);
	assert!((result.items[1].similarity - 0.8).abs() < 1e-5);
	assert!(result.items.iter().all(|r| !r.unranked));
}

#[tokio::test]
async fn embedding_failure_falls_back_to_recency() {
	let store = Arc::new(MemoryStore::new());
	let older = item(Category::Insight, "alpha", 20, &[]);
	let newer = item(Category::Insight, "alpha", 10, &[]);

	store.insert(older.clone(), Some(unit(1.0)));
	store.insert(newer.clone(), Some(unit(0.5)));

	let service = service_with(store, rust_embedding());
	let result = service
		.retrieve(request("no stub for this", search_only(DiversifyStrategy::None)))
		.await
		.expect("Embedding failures must not surface.");

	assert_eq!(ids(&result.items), vec![newer.id, older.id]);
	assert!(result.items.iter().all(|r| r.unranked));
}

#[tokio::test]
async fn wrong_shape_embedding_falls_back_to_recency() {
	let store = Arc::new(MemoryStore::new());
	let stored = item(Category::Failure, "alpha", 10, &[]);

	store.insert(stored.clone(), Some(unit(1.0)));

	let service = service_with(store, StubEmbedding::new(&[("rust", vec![1.0, 0.0])]));
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![stored.id]);
	assert!(result.items[0].unranked);
}

#[tokio::test]
async fn vector_load_failure_and_empty_vector_set_fall_back() {
	let flaky_inner = MemoryStore::new();
	let stored = item(Category::Pattern, "alpha", 10, &[]);

	flaky_inner.insert(stored.clone(), Some(unit(1.0)));

	let flaky = FlakyStore { inner: flaky_inner, fail_vectors: true, fail_access: false };
	let service = service_with(Arc::new(flaky), rust_embedding());
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect("Vector load failures must not surface.");

	assert_eq!(ids(&result.items), vec![stored.id]);
	assert!(result.items[0].unranked);

	let unvectored = Arc::new(MemoryStore::new());
	let plain = item(Category::Pattern, "alpha", 10, &[]);

	unvectored.insert(plain.clone(), None);

	let service = service_with(unvectored, rust_embedding());
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![plain.id]);
	assert!(result.items[0].unranked);
}

#[tokio::test]
async fn dimension_mismatch_is_a_hard_error() {
	let store = Arc::new(MemoryStore::new());

	store.insert(item(Category::Win, "alpha", 10, &[]), Some(vec![1.0, 0.0]));

	let service = service_with(store, rust_embedding());
	let err = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect_err("Expected a dimension mismatch.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "unexpected error {err:?}");
}

#[tokio::test]
async fn tag_filter_applies_to_ranked_and_fallback_results() {
	let store = Arc::new(MemoryStore::new());
	let tagged = item(Category::Solution, "alpha", 20, &["Rust", "async"]);
	let other_tag = item(Category::Solution, "alpha", 15, &["python"]);
	let untagged = item(Category::Solution, "alpha", 10, &[]);

	store.insert(tagged.clone(), Some(unit(0.9)));
	store.insert(other_tag.clone(), Some(unit(0.95)));
	store.insert(untagged.clone(), Some(unit(1.0)));

	let service = service_with(store, rust_embedding());
	let options = RetrieveOptions {
		tags: vec!["rust".to_string()],
		..search_only(DiversifyStrategy::None)
	};
	let ranked = service.retrieve(request("rust", options.clone())).await.expect("Retrieve failed.");
	let fallback = service.retrieve(request("", options)).await.expect("Retrieve failed.");

	assert_eq!(ids(&ranked.items), vec![tagged.id]);
	assert!(!ranked.items[0].unranked);
	assert_eq!(ids(&fallback.items), vec![tagged.id]);
	assert!(fallback.items[0].unranked);
}

#[tokio::test]
async fn tag_filter_runs_before_the_limit_is_applied() {
	let store = Arc::new(MemoryStore::new());
	let untagged_best = item(Category::Solution, "alpha", 20, &[]);
	let tagged = item(Category::Solution, "alpha", 10, &["rust"]);

	store.insert(untagged_best.clone(), Some(unit(1.0)));
	store.insert(tagged.clone(), Some(unit(0.9)));

	let service = service_with(store, rust_embedding());
	let unfiltered = RetrieveOptions { limit: Some(1), ..search_only(DiversifyStrategy::None) };
	let filtered = RetrieveOptions { tags: vec!["rust".to_string()], ..unfiltered.clone() };
	let top = service.retrieve(request("rust", unfiltered)).await.expect("Retrieve failed.");
	let top_tagged = service.retrieve(request("rust", filtered)).await.expect("Retrieve failed.");

	assert_eq!(ids(&top.items), vec![untagged_best.id]);
	assert_eq!(ids(&top_tagged.items), vec![tagged.id]);
	assert!((top_tagged.items[0].similarity - 0.9).abs() < 1e-5);
	assert!(!top_tagged.items[0].unranked);
}

#[tokio::test]
async fn usage_boost_reorders_frequently_used_items() {
	let store = Arc::new(MemoryStore::new());
	let relevant = item(Category::Decision, "alpha", 20, &[]);
	let mut popular = item(Category::Decision, "alpha", 10, &[]);
	let now = OffsetDateTime::now_utc();

	popular.access_count = 100;
	popular.first_accessed_at = Some(now - Duration::days(10));
	popular.last_accessed_at = Some(now);

	store.insert(relevant.clone(), Some(unit(0.8)));
	store.insert(popular.clone(), Some(unit(0.75)));

	let service = service_with(store, rust_embedding());
	let options =
		RetrieveOptions { include_tier3: Some(true), ..search_only(DiversifyStrategy::None) };
	let result = service.retrieve(request("rust", options)).await.expect("Retrieve failed.");
	let tier3 = result.tier3.as_ref().expect("Tier 3 output missing.");

	assert!(result.tier2.is_none());
	assert_eq!(ids(&result.items), vec![popular.id, relevant.id]);
	assert_eq!(tier3[0].result.item.id, popular.id);
	assert!(tier3[0].usage_score > 0.45 && tier3[0].usage_score < 0.47);
	assert_eq!(tier3[1].usage_score, 0.0);
	assert_eq!(tier3[1].boosted_similarity, tier3[1].base_similarity);

	for boosted in tier3 {
		assert!(boosted.base_similarity <= boosted.boosted_similarity);
		assert!(boosted.boosted_similarity <= 1.0);
	}

	assert!((result.items[0].similarity - tier3[0].boosted_similarity).abs() < f32::EPSILON);
}

#[tokio::test]
async fn oversized_item_is_cut_by_the_budget() {
	let store = Arc::new(MemoryStore::new());
	let mut huge = item(Category::Pattern, "alpha", 20, &[]);
	let small = item(Category::Pattern, "alpha", 10, &[]);

	huge.content = "x".repeat(10_000);

	store.insert(huge, Some(unit(1.0)));
	store.insert(small, Some(unit(0.9)));

	let service = service_with(store, rust_embedding());
	let options =
		RetrieveOptions { token_budget: Some(100), ..search_only(DiversifyStrategy::None) };
	let result = service.retrieve(request("rust", options)).await.expect("Retrieve failed.");

	assert!(result.items.is_empty());
	assert!(result.truncated);
	assert_eq!(result.total_tokens, 0);
	assert_eq!(result.diversity_score, 0.0);
}

#[tokio::test]
async fn category_strategy_interleaves_the_final_list() {
	let store = Arc::new(MemoryStore::new());
	let win_a = item(Category::Win, "alpha", 40, &[]);
	let win_b = item(Category::Win, "alpha", 30, &[]);
	let solution = item(Category::Solution, "alpha", 20, &[]);
	let pattern = item(Category::Pattern, "alpha", 10, &[]);

	store.insert(win_a.clone(), Some(unit(1.0)));
	store.insert(win_b.clone(), Some(unit(0.95)));
	store.insert(solution.clone(), Some(unit(0.9)));
	store.insert(pattern.clone(), Some(unit(0.85)));

	let service = service_with(store, rust_embedding());
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::Category)))
		.await
		.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![win_a.id, solution.id, pattern.id, win_b.id]);
	assert_eq!(result.diversity.category_distribution.get(&Category::Win), Some(&2));
	assert!(!result.diversity.category_dominated);
	assert!(result.diversity.project_dominated);
	assert!(result.diversity_score > 0.0 && result.diversity_score <= 1.0);
}

#[tokio::test]
async fn fingerprint_tier_reports_project_context() {
	let empty = service_with(Arc::new(MemoryStore::new()), rust_embedding());
	let options = RetrieveOptions {
		include_tier2: Some(false),
		project: Some("alpha".to_string()),
		..Default::default()
	};
	let result = empty.retrieve(request("rust", options.clone())).await.expect("Retrieve failed.");
	let tier1 = result.tier1.expect("Tier 1 output missing.");

	assert_eq!(tier1.fingerprint.total_items, 0);
	assert!(tier1.fingerprint.by_category.is_empty());
	assert!(tier1.recent_wins.is_empty());
	assert!(tier1.token_count > 0);
	assert!(result.tier2.is_none());
	assert!(result.items.is_empty());

	let store = Arc::new(MemoryStore::new());
	let wins: Vec<Item> = (1..=4).map(|age| item(Category::Win, "alpha", age * 10, &[])).collect();

	for win in &wins {
		store.insert(win.clone(), None);
	}

	store.insert(item(Category::Win, "beta", 1, &[]), None);
	store.insert(item(Category::Failure, "alpha", 1, &[]), None);

	let service = service_with(store, rust_embedding());
	let result = service.retrieve(request("rust", options)).await.expect("Retrieve failed.");
	let tier1 = result.tier1.expect("Tier 1 output missing.");
	let win_ids: Vec<Uuid> = tier1.recent_wins.iter().map(|item| item.id).collect();

	assert_eq!(tier1.fingerprint.total_items, 5);
	assert_eq!(tier1.fingerprint.by_category.get(&Category::Win), Some(&4));
	assert_eq!(win_ids, vec![wins[0].id, wins[1].id, wins[2].id]);
}

#[tokio::test]
async fn usage_is_recorded_only_for_returned_items() {
	let store = Arc::new(MemoryStore::new());
	let returned = item(Category::Win, "alpha", 20, &[]);
	let skipped = item(Category::Win, "alpha", 10, &[]);

	store.insert(returned.clone(), Some(unit(1.0)));
	store.insert(skipped.clone(), Some(unit(0.9)));

	let usage = UsageTracker::spawn(store.clone(), 16);
	let service = StrataService::with_backends(
		test_config(),
		store.clone(),
		Providers::new(Arc::new(rust_embedding())),
		usage,
	);
	let options = RetrieveOptions { limit: Some(1), ..search_only(DiversifyStrategy::None) };
	let result = service.retrieve(request("rust", options)).await.expect("Retrieve failed.");

	assert_eq!(ids(&result.items), vec![returned.id]);
	assert!(
		wait_until(|| {
			store.get(returned.id).is_some_and(|item| item.access_count == 1)
		})
		.await
	);
	assert_eq!(store.get(skipped.id).map(|item| item.access_count), Some(0));
	assert!(store.get(returned.id).is_some_and(|item| item.last_accessed_at.is_some()));

	let stats = service.usage.stats();

	assert_eq!(stats.enqueued, 1);
	assert_eq!(stats.recorded, 1);
	assert_eq!(stats.dropped, 0);
}

#[tokio::test]
async fn usage_failures_never_reach_the_caller() {
	let inner = MemoryStore::new();

	inner.insert(item(Category::Insight, "alpha", 20, &[]), Some(unit(1.0)));
	inner.insert(item(Category::Insight, "alpha", 10, &[]), Some(unit(0.9)));

	let store: Arc<dyn RecordStore> =
		Arc::new(FlakyStore { inner, fail_vectors: false, fail_access: true });
	let usage = UsageTracker::spawn(store.clone(), 16);
	let service = StrataService::with_backends(
		test_config(),
		store,
		Providers::new(Arc::new(rust_embedding())),
		usage,
	);
	let result = service
		.retrieve(request("rust", search_only(DiversifyStrategy::None)))
		.await
		.expect("Usage failures must not surface.");

	assert_eq!(result.items.len(), 2);
	assert!(wait_until(|| service.usage.stats().failed == 2).await);
	assert_eq!(service.usage.stats().recorded, 0);
}

#[tokio::test]
async fn disabled_tiers_produce_an_empty_result() {
	let store = Arc::new(MemoryStore::new());

	store.insert(item(Category::Win, "alpha", 10, &[]), Some(unit(1.0)));

	let service = service_with(store, rust_embedding());
	let options = RetrieveOptions {
		include_tier1: Some(false),
		include_tier2: Some(false),
		include_tier3: Some(false),
		..Default::default()
	};
	let result = service.retrieve(request("rust", options)).await.expect("Retrieve failed.");

	assert!(result.tier1.is_none() && result.tier2.is_none() && result.tier3.is_none());
	assert!(result.items.is_empty());
	assert!(!result.truncated);
	assert_eq!(service.usage.stats().enqueued, 0);
}
