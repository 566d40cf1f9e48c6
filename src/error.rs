//! Broker-level error types shared across exchangers, credential sources, and the transport.

// self
use crate::{
	_prelude::*, credential::CredentialError, image::ImageReferenceError, provider::ProviderKind,
};

/// Result alias defaulting to the broker [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Every failure a login can end in.
///
/// Messages only ever carry structural information (provider labels, status codes, segment
/// counts, JSON paths); issued secrets never appear in them.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Autologin is disabled for the provider that owns the image.
	///
	/// This is a configuration gap, not a transient failure.
	#[error(
		"Registry provider {provider} is not configured for login; enable its autologin option."
	)]
	UnconfiguredProvider {
		/// Provider that owns the image.
		provider: ProviderKind,
	},
	/// Image does not match the provider's registry host pattern.
	#[error("Image `{image}` is not a valid {provider} registry image.")]
	ImageParse {
		/// Provider whose pattern was applied.
		provider: ProviderKind,
		/// Raw image string.
		image: String,
	},
	/// Raw image string could not be parsed into a reference.
	#[error(transparent)]
	Reference(#[from] ImageReferenceError),
	/// Broker configuration is unusable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Ambient identity could not be turned into an access token.
	#[error("Failed to obtain a {provider} access token.")]
	Credential {
		/// Provider whose credential source failed.
		provider: ProviderKind,
		/// Credential-source failure.
		#[source]
		source: CredentialError,
	},

	/// AWS ECR API call failed.
	#[error("AWS ECR authorization token request failed.")]
	Sdk {
		/// SDK-level failure (transport, signing, service error).
		#[source]
		source: BoxError,
	},
	/// ECR returned no authorization data.
	#[error("ECR returned no authorization data.")]
	EmptyAuthorizationData,
	/// ECR authorization data is missing its token.
	#[error("ECR authorization data has no authorization token.")]
	MissingAuthorizationToken,
	/// ECR authorization token is not valid base64.
	#[error("ECR authorization token is not valid base64.")]
	TokenEncoding {
		/// Decoder failure.
		#[source]
		source: base64::DecodeError,
	},
	/// Decoded ECR token does not split into `username:password`.
	#[error(
		"Invalid authorization token, expected 2 colon-separated segments but found {segments}."
	)]
	InvalidTokenFormat {
		/// Number of segments found after splitting on `:`.
		segments: usize,
	},

	/// Registry token exchange answered with a non-success status.
	#[error("Registry token exchange failed with status {status}: {detail}.")]
	ExchangeHttp {
		/// HTTP status code.
		status: u16,
		/// Joined remote error messages, or a preview of the raw body.
		detail: String,
	},
	/// Registry token exchange succeeded but the body is malformed.
	#[error("Registry token exchange returned a malformed body at `{path}` ({category}).")]
	ExchangeDecode {
		/// JSON path where decoding stopped.
		path: String,
		/// serde_json error category.
		category: &'static str,
	},
}
impl Error {
	/// Returns `true` when the failure stems from a disabled provider rather than the provider
	/// itself.
	pub fn is_unconfigured(&self) -> bool {
		matches!(self, Self::UnconfiguredProvider { .. })
	}

	pub(crate) fn unconfigured(provider: ProviderKind) -> Self {
		Self::UnconfiguredProvider { provider }
	}

	pub(crate) fn credential(provider: ProviderKind, source: CredentialError) -> Self {
		Self::Credential { provider, source }
	}

	pub(crate) fn exchange_decode(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::ExchangeDecode {
			path: err.path().to_string(),
			category: json_category(err.inner()),
		}
	}
}

/// Broker configuration failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// reqwest refused the client settings.
	#[error("Failed to build the HTTP client.")]
	HttpClientBuild {
		/// Builder failure.
		#[source]
		source: BoxError,
	},
	/// An outgoing request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint could not be composed into a valid URL.
	#[error("Endpoint `{endpoint}` is not a valid URL.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// URL parser failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Boxes an HTTP client builder failure.
	pub fn http_client_build(source: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(source) }
	}
}

/// Failures below the HTTP layer.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Request never produced a response.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// reqwest failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Boxes a network failure against `endpoint`.
	pub fn network(endpoint: &'static str, source: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(source) }
	}
}

pub(crate) fn json_category(err: &serde_json::Error) -> &'static str {
	match err.classify() {
		serde_json::error::Category::Io => "io",
		serde_json::error::Category::Syntax => "syntax",
		serde_json::error::Category::Data => "data",
		serde_json::error::Category::Eof => "eof",
	}
}
