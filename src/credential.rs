//! Ambient identity sources that mint cloud access tokens.
//!
//! [`TokenCredential`] is the seam between exchangers and identity: exchangers ask for a token
//! for a set of scopes and never learn where it came from. `azure` and `gcp` provide the
//! ambient chains the exchangers fall back to; [`StaticCredential`] covers injected tokens.
//! Nothing here caches tokens; every call reaches the underlying source.

pub mod azure;
pub mod chain;
pub mod gcp;

mod oauth;

pub use chain::ChainedCredential;

// crates.io
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret, error::BoxError, http};

/// Boxed future returned by [`TokenCredential::get_token`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessToken, CredentialError>> + 'a + Send>>;

/// Source of short-lived cloud access tokens.
///
/// Implementations must be `Send + Sync` so a single instance can back concurrent logins.
pub trait TokenCredential
where
	Self: Send + Sync,
{
	/// Stable label used in logs and aggregated chain errors.
	fn kind(&self) -> &'static str;

	/// Requests an access token valid for `scopes`.
	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a>;
}

/// Builds a credential the first time an exchanger needs one.
pub type CredentialFactory = Arc<dyn Fn() -> Result<Arc<dyn TokenCredential>> + Send + Sync>;

/// Credential handle that is either injected up front or built on first use.
///
/// Deferred construction runs at most once, even when several logins race for it; a failed
/// construction is not cached and the next caller tries again.
pub enum LazyCredential {
	/// Injected credential.
	Fixed(Arc<dyn TokenCredential>),
	/// Credential built by `factory` and published through `cell`.
	Deferred {
		/// Single-assignment slot.
		cell: OnceCell<Arc<dyn TokenCredential>>,
		/// Constructor.
		factory: CredentialFactory,
	},
}
impl LazyCredential {
	/// Wraps an injected credential.
	pub fn fixed(credential: Arc<dyn TokenCredential>) -> Self {
		Self::Fixed(credential)
	}

	/// Defers construction to `factory`.
	pub fn deferred(factory: CredentialFactory) -> Self {
		Self::Deferred { cell: OnceCell::new(), factory }
	}

	/// Returns `true` once a credential is available without calling the factory.
	pub fn is_initialized(&self) -> bool {
		match self {
			Self::Fixed(_) => true,
			Self::Deferred { cell, .. } => cell.is_initialized(),
		}
	}

	/// Returns the credential, constructing it on first use.
	pub async fn resolve(&self) -> Result<Arc<dyn TokenCredential>> {
		match self {
			Self::Fixed(credential) => Ok(credential.clone()),
			Self::Deferred { cell, factory } => {
				let credential = cell
					.get_or_try_init(|| async {
						let credential = factory()?;

						tracing::debug!(
							credential = credential.kind(),
							"Initialized ambient credential."
						);

						Ok::<_, Error>(credential)
					})
					.await?;

				Ok(credential.clone())
			},
		}
	}
}
impl Debug for LazyCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Fixed(credential) => f.debug_tuple("Fixed").field(&credential.kind()).finish(),
			Self::Deferred { cell, .. } => f
				.debug_struct("Deferred")
				.field("initialized", &cell.is_initialized())
				.finish_non_exhaustive(),
		}
	}
}

/// Access token minted by a [`TokenCredential`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer token value.
	pub token: TokenSecret,
	/// Expiry reported by the issuer, when it reported one.
	pub expires_on: Option<OffsetDateTime>,
}
impl AccessToken {
	/// Wraps a token without expiry metadata.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token), expires_on: None }
	}

	/// Attaches an expiry computed from a relative lifetime in seconds.
	pub fn expiring_in(mut self, seconds: u64) -> Self {
		self.expires_on = i64::try_from(seconds)
			.ok()
			.and_then(|secs| OffsetDateTime::now_utc().checked_add(time::Duration::seconds(secs)));

		self
	}

	/// Attaches an absolute expiry expressed as a Unix timestamp.
	pub fn expiring_at_unix(mut self, timestamp: i64) -> Self {
		self.expires_on = OffsetDateTime::from_unix_timestamp(timestamp).ok();

		self
	}
}

/// Failures raised by credential sources.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Required environment or configuration for this source is absent.
	#[error("{credential} credential is unavailable: {reason}.")]
	Unavailable {
		/// Credential label.
		credential: &'static str,
		/// What is missing.
		reason: String,
	},
	/// The identity endpoint refused to issue a token.
	#[error("{credential} token request was rejected{}: {detail}.", status_suffix(.status))]
	Rejected {
		/// Credential label.
		credential: &'static str,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider error code or description.
		detail: String,
	},
	/// The identity endpoint could not be reached.
	#[error("{credential} token endpoint could not be reached.")]
	Transport {
		/// Credential label.
		credential: &'static str,
		/// Transport failure.
		#[source]
		source: BoxError,
	},
	/// The identity endpoint answered with a malformed body.
	#[error("{credential} token response is malformed at `{path}` ({category}).")]
	Decode {
		/// Credential label.
		credential: &'static str,
		/// JSON path where decoding stopped.
		path: String,
		/// serde_json error category.
		category: &'static str,
	},
	/// A token or key file could not be read.
	#[error("{credential} could not read `{path}`.")]
	Io {
		/// Credential label.
		credential: &'static str,
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// The application default credentials file holds an unsupported key type.
	#[error("Application default credentials of type `{kind}` are not supported.")]
	UnsupportedKeyType {
		/// Value of the file's `type` field.
		kind: String,
	},
	/// Every source in a chain failed.
	#[error("No credential source produced a token: [{}].", .attempts.join("; "))]
	Exhausted {
		/// One entry per attempted source, in chain order.
		attempts: Vec<String>,
	},
}
impl CredentialError {
	pub(crate) fn transport(
		credential: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Transport { credential, source: Box::new(src) }
	}

	pub(crate) fn decode(
		credential: &'static str,
		err: &serde_path_to_error::Error<serde_json::Error>,
	) -> Self {
		Self::Decode {
			credential,
			path: err.path().to_string(),
			category: crate::error::json_category(err.inner()),
		}
	}
}

fn status_suffix(status: &Option<u16>) -> String {
	status.map(|code| format!(" with status {code}")).unwrap_or_default()
}

#[derive(Deserialize)]
struct EndpointErrorBody {
	error: Option<String>,
	error_description: Option<String>,
}

/// Sends a token request to a JSON identity endpoint and decodes the success body.
///
/// Non-success answers become [`CredentialError::Rejected`], preferring the OAuth-style
/// `error`/`error_description` fields over a raw body preview.
pub(crate) async fn fetch_json<T>(
	credential: &'static str,
	request: RequestBuilder,
) -> Result<T, CredentialError>
where
	T: DeserializeOwned,
{
	let response =
		request.send().await.map_err(|err| CredentialError::transport(credential, err))?;
	let status = response.status();
	let body = response.bytes().await.map_err(|err| CredentialError::transport(credential, err))?;

	if !status.is_success() {
		let detail = serde_json::from_slice::<EndpointErrorBody>(&body)
			.ok()
			.and_then(|parsed| match (parsed.error, parsed.error_description) {
				(Some(error), Some(description)) => Some(format!("{error}: {description}")),
				(Some(error), None) => Some(error),
				(None, description) => description,
			})
			.unwrap_or_else(|| http::body_preview(&body));

		return Err(CredentialError::Rejected { credential, status: Some(status.as_u16()), detail });
	}

	let mut de = serde_json::Deserializer::from_slice(&body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|err| CredentialError::decode(credential, &err))
}

/// Credential returning a fixed token, or a fixed failure.
///
/// Used to inject pre-obtained tokens and as a test double.
#[derive(Clone)]
pub struct StaticCredential {
	outcome: std::result::Result<TokenSecret, String>,
}
impl StaticCredential {
	/// Always yields `token`.
	pub fn new(token: impl Into<String>) -> Self {
		Self { outcome: Ok(TokenSecret::new(token)) }
	}

	/// Always fails with a [`CredentialError::Rejected`] carrying `reason`.
	pub fn failing(reason: impl Into<String>) -> Self {
		Self { outcome: Err(reason.into()) }
	}
}
impl Debug for StaticCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StaticCredential").field("ok", &self.outcome.is_ok()).finish()
	}
}
impl TokenCredential for StaticCredential {
	fn kind(&self) -> &'static str {
		"static"
	}

	fn get_token<'a>(&'a self, _scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			match &self.outcome {
				Ok(token) => Ok(AccessToken { token: token.clone(), expires_on: None }),
				Err(reason) => Err(CredentialError::Rejected {
					credential: "static",
					status: None,
					detail: reason.clone(),
				}),
			}
		})
	}
}
