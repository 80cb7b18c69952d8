pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Vector dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Vectors must be non-empty.")]
	EmptyVector,
	#[error("Unknown category: {0}.")]
	UnknownCategory(String),
	#[error("Unknown diversify strategy: {0}.")]
	UnknownStrategy(String),
}
