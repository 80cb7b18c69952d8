pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Encoding error: {message}")]
	Encoding { message: String },
}
impl From<strata_storage::Error> for Error {
	fn from(err: strata_storage::Error) -> Self {
		match err {
			strata_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<strata_domain::Error> for Error {
	fn from(err: strata_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Encoding { message: err.to_string() }
	}
}
