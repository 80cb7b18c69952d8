#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Corrupt row: {0}")]
	CorruptRow(String),
}
impl From<strata_domain::Error> for Error {
	fn from(err: strata_domain::Error) -> Self {
		Self::CorruptRow(err.to_string())
	}
}
