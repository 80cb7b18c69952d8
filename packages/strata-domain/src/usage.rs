use time::OffsetDateTime;

use crate::{SearchResult, UsageBoostedResult, similarity};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UsageBoostParams {
	pub boost_factor: f32,
	pub time_decay_days: f32,
	pub min_access_count: i64,
}
impl Default for UsageBoostParams {
	fn default() -> Self {
		Self { boost_factor: 0.2, time_decay_days: 30.0, min_access_count: 1 }
	}
}

/// Usage signal in `[0, 1]`: `ln(count + 1) / 10` discounted by `exp(-days / decay)`.
///
/// Items below the access threshold, or never accessed, score `0.0`. Access times in the future
/// count as "now".
pub fn usage_score(
	access_count: i64,
	last_accessed_at: Option<OffsetDateTime>,
	now: OffsetDateTime,
	params: &UsageBoostParams,
) -> f32 {
	if access_count <= 0 || access_count < params.min_access_count {
		return 0.0;
	}

	let Some(last_accessed_at) = last_accessed_at else {
		return 0.0;
	};
	let days = ((now - last_accessed_at).as_seconds_f64() / SECONDS_PER_DAY).max(0.0);
	let frequency = ((access_count as f64) + 1.0).ln() / 10.0;
	let decay = if params.time_decay_days > 0.0 {
		(-days / params.time_decay_days as f64).exp()
	} else {
		1.0
	};

	(frequency * decay).clamp(0.0, 1.0) as f32
}

pub fn boosted_similarity(base: f32, usage_score: f32, boost_factor: f32) -> f32 {
	let boosted = (base + usage_score * boost_factor).min(1.0);

	// Keeps `base <= boosted` even for a base that already exceeds the cap.
	boosted.max(base.min(1.0))
}

pub fn boost_result(
	result: SearchResult,
	access_count: i64,
	last_accessed_at: Option<OffsetDateTime>,
	now: OffsetDateTime,
	params: &UsageBoostParams,
) -> UsageBoostedResult {
	let base_similarity = result.similarity;
	let usage_score = usage_score(access_count, last_accessed_at, now, params);
	let boosted_similarity = if usage_score > 0.0 {
		boosted_similarity(base_similarity, usage_score, params.boost_factor)
	} else {
		base_similarity
	};

	UsageBoostedResult { result, base_similarity, usage_score, boosted_similarity }
}

/// Stable descending sort by boosted similarity.
pub fn sort_by_boosted(results: &mut [UsageBoostedResult]) {
	results.sort_by(|a, b| similarity::cmp_f32_desc(a.boosted_similarity, b.boosted_similarity));
}
