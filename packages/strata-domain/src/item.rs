use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
	Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	Win,
	Failure,
	Decision,
	Pattern,
	Solution,
	Insight,
	Preference,
}
impl Category {
	pub const ALL: [Self; 7] = [
		Self::Win,
		Self::Failure,
		Self::Decision,
		Self::Pattern,
		Self::Solution,
		Self::Insight,
		Self::Preference,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Win => "win",
			Self::Failure => "failure",
			Self::Decision => "decision",
			Self::Pattern => "pattern",
			Self::Solution => "solution",
			Self::Insight => "insight",
			Self::Preference => "preference",
		}
	}
}
impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Category {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|category| category.as_str().eq_ignore_ascii_case(raw.trim()))
			.ok_or_else(|| Error::UnknownCategory(raw.to_string()))
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Item {
	pub id: Uuid,
	pub category: Category,
	pub project: String,
	pub summary: String,
	pub content: String,
	#[serde(default)]
	pub rationale: Option<String>,
	#[serde(default)]
	pub alternatives: Vec<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub related_refs: Vec<String>,
	pub verified: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
	pub access_count: i64,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub first_accessed_at: Option<OffsetDateTime>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub last_accessed_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub embedding_model: Option<String>,
}
impl Item {
	/// Case-insensitive tag intersection. An item without tags never matches.
	pub fn has_any_tag(&self, wanted: &[String]) -> bool {
		self.tags.iter().any(|tag| wanted.iter().any(|want| want.eq_ignore_ascii_case(tag)))
	}
}

#[derive(Clone, Debug)]
pub struct ItemVector {
	pub item: Item,
	pub vector: Vec<f32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SearchResult {
	pub item: Item,
	pub similarity: f32,
	/// Set when the result was chosen by recency, not by a computed similarity.
	#[serde(default)]
	pub unranked: bool,
}
impl SearchResult {
	pub fn ranked(item: Item, similarity: f32) -> Self {
		Self { item, similarity, unranked: false }
	}

	pub fn by_recency(item: Item) -> Self {
		Self { item, similarity: 1.0, unranked: true }
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UsageBoostedResult {
	#[serde(flatten)]
	pub result: SearchResult,
	pub base_similarity: f32,
	pub usage_score: f32,
	pub boosted_similarity: f32,
}
impl UsageBoostedResult {
	/// Collapses into a plain result whose similarity is the boosted one.
	pub fn into_search_result(self) -> SearchResult {
		SearchResult { similarity: self.boosted_similarity, ..self.result }
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProjectFingerprint {
	pub total_items: u64,
	pub by_category: BTreeMap<Category, u64>,
	pub top_accessed: Vec<Item>,
	pub most_recent: Vec<Item>,
}
