use serde::{Deserialize, Deserializer, de};
use serde_json::{Map, Value};

use strata_domain::diversity::DiversifyStrategy;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub usage_tracking: UsageTracking,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Defaults for the tiered retrieval pipeline. Individual requests may override the top-level
/// switches.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub token_budget: u32,
	/// One of `none`, `category`, `project`, or `both`, matched case-insensitively.
	#[serde(deserialize_with = "deserialize_strategy")]
	pub diversify: DiversifyStrategy,
	pub include_tier1: bool,
	pub include_tier2: bool,
	pub include_tier3: bool,
	pub fingerprint: RetrievalFingerprint,
	pub semantic: RetrievalSemantic,
	pub usage_boost: RetrievalUsageBoost,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			token_budget: 8_000,
			diversify: DiversifyStrategy::Category,
			include_tier1: true,
			include_tier2: true,
			include_tier3: false,
			fingerprint: Default::default(),
			semantic: Default::default(),
			usage_boost: Default::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalFingerprint {
	pub top_n: u32,
	pub wins_limit: u32,
}
impl Default for RetrievalFingerprint {
	fn default() -> Self {
		Self { top_n: 5, wins_limit: 3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalSemantic {
	pub limit: u32,
	pub min_similarity: f32,
}
impl Default for RetrievalSemantic {
	fn default() -> Self {
		Self { limit: 20, min_similarity: 0.3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalUsageBoost {
	pub boost_factor: f32,
	pub time_decay_days: f32,
	pub min_access_count: i64,
}
impl Default for RetrievalUsageBoost {
	fn default() -> Self {
		Self { boost_factor: 0.2, time_decay_days: 30.0, min_access_count: 1 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UsageTracking {
	pub enabled: bool,
	pub queue_capacity: usize,
}
impl Default for UsageTracking {
	fn default() -> Self {
		Self { enabled: true, queue_capacity: 1_024 }
	}
}

fn deserialize_strategy<'de, D>(deserializer: D) -> Result<DiversifyStrategy, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	raw.parse().map_err(|_| {
		de::Error::custom("retrieval.diversify must be one of none, category, project, or both.")
	})
}
