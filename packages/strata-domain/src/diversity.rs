use std::{
	collections::{BTreeMap, HashMap},
	fmt,
	hash::Hash,
	str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Category, Error, Result, SearchResult};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversifyStrategy {
	None,
	#[default]
	Category,
	Project,
	/// Groups by the `(category, project)` pair.
	Both,
}
impl DiversifyStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Category => "category",
			Self::Project => "project",
			Self::Both => "both",
		}
	}
}
impl fmt::Display for DiversifyStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for DiversifyStrategy {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"none" => Ok(Self::None),
			"category" => Ok(Self::Category),
			"project" => Ok(Self::Project),
			"both" => Ok(Self::Both),
			_ => Err(Error::UnknownStrategy(raw.to_string())),
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DiversityMetrics {
	pub score: f32,
	pub category_distribution: BTreeMap<Category, usize>,
	pub project_distribution: BTreeMap<String, usize>,
	pub category_dominated: bool,
	pub project_dominated: bool,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum GroupKey<'a> {
	Category(Category),
	Project(&'a str),
	Both(Category, &'a str),
}

pub fn diversity_metrics(results: &[SearchResult]) -> DiversityMetrics {
	let mut category_distribution: BTreeMap<Category, usize> = BTreeMap::new();
	let mut project_distribution: BTreeMap<String, usize> = BTreeMap::new();

	for result in results {
		*category_distribution.entry(result.item.category).or_default() += 1;
		*project_distribution.entry(result.item.project.clone()).or_default() += 1;
	}

	let total = results.len();
	let score = if total == 0 {
		0.0
	} else {
		let category_entropy = normalized_entropy(category_distribution.values().copied(), total);
		let project_entropy = normalized_entropy(project_distribution.values().copied(), total);

		((category_entropy + project_entropy) / 2.0).clamp(0.0, 1.0)
	};

	DiversityMetrics {
		score,
		category_dominated: is_dominated(category_distribution.values().copied(), total),
		project_dominated: is_dominated(project_distribution.values().copied(), total),
		category_distribution,
		project_distribution,
	}
}

/// Round-robin across groups keyed by `strategy`, in first-seen group order.
///
/// The output is always a permutation of the input.
pub fn interleave(results: Vec<SearchResult>, strategy: DiversifyStrategy) -> Vec<SearchResult> {
	if strategy == DiversifyStrategy::None || results.len() < 2 {
		return results;
	}

	let total = results.len();
	let keys: Vec<GroupKey<'_>> =
		results.iter().map(|result| group_key(result, strategy)).collect();
	let groups = group_positions(&keys);

	drop(keys);

	let mut slots: Vec<Option<SearchResult>> = results.into_iter().map(Some).collect();
	let mut cursors = vec![0_usize; groups.len()];
	let mut out = Vec::with_capacity(total);
	let mut rounds = 0_usize;

	while out.len() < total && rounds < total {
		for (group, positions) in groups.iter().enumerate() {
			let Some(&position) = positions.get(cursors[group]) else { continue };

			cursors[group] += 1;

			if let Some(result) = slots[position].take() {
				out.push(result);
			}
		}

		rounds += 1;
	}

	// Anything the round cap left behind keeps its original relative order.
	out.extend(slots.into_iter().flatten());

	out
}

fn group_key(result: &SearchResult, strategy: DiversifyStrategy) -> GroupKey<'_> {
	match strategy {
		DiversifyStrategy::Project => GroupKey::Project(result.item.project.as_str()),
		DiversifyStrategy::Both =>
			GroupKey::Both(result.item.category, result.item.project.as_str()),
		DiversifyStrategy::Category | DiversifyStrategy::None =>
			GroupKey::Category(result.item.category),
	}
}

fn group_positions<K>(keys: &[K]) -> Vec<Vec<usize>>
where
	K: Eq + Hash,
{
	let mut index_by_key: HashMap<&K, usize> = HashMap::with_capacity(keys.len());
	let mut groups: Vec<Vec<usize>> = Vec::new();

	for (position, key) in keys.iter().enumerate() {
		let group = *index_by_key.entry(key).or_insert_with(|| {
			groups.push(Vec::new());

			groups.len() - 1
		});

		groups[group].push(position);
	}

	groups
}

fn normalized_entropy(counts: impl Iterator<Item = usize> + Clone, total: usize) -> f32 {
	let distinct = counts.clone().filter(|count| *count > 0).count();

	if distinct <= 1 || total == 0 {
		return 0.0;
	}

	let total = total as f64;
	let entropy: f64 = counts
		.filter(|count| *count > 0)
		.map(|count| {
			let p = count as f64 / total;

			-p * p.ln()
		})
		.sum();

	(entropy / (distinct as f64).ln()) as f32
}

fn is_dominated(mut counts: impl Iterator<Item = usize>, total: usize) -> bool {
	counts.any(|count| count * 2 > total)
}
