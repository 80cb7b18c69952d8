mod fingerprint;
mod semantic;
mod usage_boost;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use strata_config::Retrieval;
use strata_domain::{
	Category, Item, ProjectFingerprint, SearchResult, UsageBoostedResult,
	budget,
	dedup,
	diversity::{self, DiversifyStrategy, DiversityMetrics},
	usage::UsageBoostParams,
};

use crate::{Error, Result, StrataService};
use semantic::SemanticQuery;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RetrieveRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub options: RetrieveOptions,
}

/// Per-request overrides. Unset fields fall back to the `[retrieval]` configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RetrieveOptions {
	pub token_budget: Option<u32>,
	pub diversify: Option<DiversifyStrategy>,
	pub include_tier1: Option<bool>,
	pub include_tier2: Option<bool>,
	pub include_tier3: Option<bool>,
	pub project: Option<String>,
	pub category: Option<Category>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub limit: Option<u32>,
	pub min_similarity: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tier1Context {
	pub fingerprint: ProjectFingerprint,
	pub recent_wins: Vec<Item>,
	pub token_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TieredRetrievalResult {
	pub tier1: Option<Tier1Context>,
	pub tier2: Option<Vec<SearchResult>>,
	pub tier3: Option<Vec<UsageBoostedResult>>,
	pub items: Vec<SearchResult>,
	pub total_tokens: usize,
	pub truncated: bool,
	pub diversity_score: f32,
	pub diversity: DiversityMetrics,
}

/// Which query-dependent tier feeds the final list. Usage boosting runs semantic search
/// internally, so the two never both contribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierSelection {
	None,
	Semantic,
	UsageBoosted,
}
impl TierSelection {
	pub fn from_flags(include_tier2: bool, include_tier3: bool) -> Self {
		if include_tier3 {
			Self::UsageBoosted
		} else if include_tier2 {
			Self::Semantic
		} else {
			Self::None
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRetrievalPolicy {
	pub token_budget: usize,
	pub diversify: DiversifyStrategy,
	pub include_fingerprint: bool,
	pub search: TierSelection,
	pub fingerprint_top_n: u32,
	pub wins_limit: u32,
	pub limit: u32,
	pub min_similarity: f32,
	pub usage_boost: UsageBoostParams,
}
impl ResolvedRetrievalPolicy {
	pub fn resolve(cfg: &Retrieval, options: &RetrieveOptions) -> Result<Self> {
		let diversify = options.diversify.unwrap_or(cfg.diversify);
		let limit = options.limit.unwrap_or(cfg.semantic.limit);

		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		let min_similarity = options.min_similarity.unwrap_or(cfg.semantic.min_similarity);

		if !min_similarity.is_finite() || !(-1.0..=1.0).contains(&min_similarity) {
			return Err(Error::InvalidRequest {
				message: "min_similarity must be a finite number in the range -1.0-1.0.".to_string(),
			});
		}

		Ok(Self {
			token_budget: options.token_budget.unwrap_or(cfg.token_budget) as usize,
			diversify,
			include_fingerprint: options.include_tier1.unwrap_or(cfg.include_tier1),
			search: TierSelection::from_flags(
				options.include_tier2.unwrap_or(cfg.include_tier2),
				options.include_tier3.unwrap_or(cfg.include_tier3),
			),
			fingerprint_top_n: cfg.fingerprint.top_n,
			wins_limit: cfg.fingerprint.wins_limit,
			limit,
			min_similarity,
			usage_boost: UsageBoostParams {
				boost_factor: cfg.usage_boost.boost_factor,
				time_decay_days: cfg.usage_boost.time_decay_days,
				min_access_count: cfg.usage_boost.min_access_count,
			},
		})
	}
}

impl StrataService {
	/// Runs the tiered pipeline: fingerprint, then one search tier, then dedup, diversification
	/// and budget enforcement in that order. Surviving items are handed to the usage tracker.
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<TieredRetrievalResult> {
		let policy = ResolvedRetrievalPolicy::resolve(&self.cfg.retrieval, &req.options)?;
		let project = req.options.project.as_deref().map(str::trim).filter(|p| !p.is_empty());
		let tier1 = if policy.include_fingerprint {
			Some(
				fingerprint::build_context(
					self.store.as_ref(),
					project,
					policy.fingerprint_top_n,
					policy.wins_limit,
				)
				.await?,
			)
		} else {
			None
		};
		let query = SemanticQuery {
			text: req.query.as_str(),
			project,
			category: req.options.category,
			tags: req.options.tags.as_slice(),
			limit: policy.limit,
			min_similarity: policy.min_similarity,
		};
		let mut tier2 = None;
		let mut tier3 = None;
		let candidates = match policy.search {
			TierSelection::UsageBoosted => {
				let now = OffsetDateTime::now_utc();
				let boosted =
					usage_boost::usage_boosted_search(self, &query, &policy.usage_boost, now).await?;
				let candidates: Vec<SearchResult> = boosted
					.iter()
					.cloned()
					.map(UsageBoostedResult::into_search_result)
					.collect();

				tier3 = Some(boosted);

				candidates
			},
			TierSelection::Semantic => {
				let results = semantic::semantic_search(self, &query).await?;
				let candidates = results.clone();

				tier2 = Some(results);

				candidates
			},
			TierSelection::None => Vec::new(),
		};
		let candidate_count = candidates.len();
		let deduped = dedup::dedup_results(candidates);
		let diversified = diversity::interleave(deduped, policy.diversify);
		let outcome = budget::enforce_budget(diversified, policy.token_budget);

		self.usage.track(outcome.kept.iter().map(|result| result.item.id));

		let diversity = diversity::diversity_metrics(&outcome.kept);

		tracing::debug!(
			candidates = candidate_count,
			kept = outcome.kept.len(),
			total_tokens = outcome.total_tokens,
			truncated = outcome.enforced,
			strategy = %policy.diversify,
			"Tiered retrieval finished."
		);

		Ok(TieredRetrievalResult {
			tier1,
			tier2,
			tier3,
			items: outcome.kept,
			total_tokens: outcome.total_tokens,
			truncated: outcome.enforced,
			diversity_score: diversity.score,
			diversity,
		})
	}
}
