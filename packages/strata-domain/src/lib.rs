pub mod budget;
pub mod dedup;
pub mod diversity;
pub mod item;
pub mod similarity;
pub mod tokens;
pub mod usage;

mod error;

pub use error::{Error, Result};
pub use item::{
	Category, Item, ItemVector, ProjectFingerprint, SearchResult, UsageBoostedResult,
};
