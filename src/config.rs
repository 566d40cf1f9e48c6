//! Broker configuration: request bounds and the endpoints the ambient credential chains use.
//!
//! [`BrokerConfig::default`] targets the public clouds. [`BrokerConfig::from_env`] additionally
//! honors the host overrides the provider SDKs read (`AZURE_AUTHORITY_HOST`,
//! `GCE_METADATA_HOST`). Autologin switches are not part of this struct; they arrive per call
//! as [`ProviderOptions`](crate::provider::ProviderOptions).

// std
use std::{env, time::Duration};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default AAD authority host.
pub const AZURE_AUTHORITY: &str = "https://login.microsoftonline.com/";
/// Default Azure instance metadata (managed identity) token endpoint.
pub const AZURE_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
/// Default GCE metadata server host.
pub const GCP_METADATA_HOST: &str = "metadata.google.internal";
/// Default Google OAuth 2.0 token endpoint.
pub const GCP_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

const GCP_METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// URL scheme used to reach a registry's token exchange endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
	/// TLS; the only scheme real registries accept.
	#[default]
	Https,
	/// Plain HTTP, for local test doubles.
	Http,
}
impl Scheme {
	/// Returns the scheme label used in URLs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Scheme::Https => "https",
			Scheme::Http => "http",
		}
	}
}
impl Display for Scheme {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Tunables shared by every exchanger the broker owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Upper bound, in milliseconds, for each HTTP request and SDK operation.
	pub request_timeout_ms: Option<u64>,
	/// Scheme for the ACR token exchange.
	pub azure_scheme: Scheme,
	/// AAD authority host used by the environment and workload identity credentials.
	pub azure_authority: String,
	/// Managed identity token endpoint.
	pub azure_imds_endpoint: String,
	/// GCE metadata server token endpoint.
	pub gcp_metadata_endpoint: String,
	/// OAuth 2.0 token endpoint for authorized-user application default credentials.
	pub gcp_token_endpoint: String,
}
impl BrokerConfig {
	/// Default configuration with the provider SDK environment overrides applied.
	pub fn from_env() -> Self {
		let mut config = Self::default();

		if let Some(authority) = non_empty_var("AZURE_AUTHORITY_HOST") {
			config.azure_authority = authority;
		}
		if let Some(host) = non_empty_var("GCE_METADATA_HOST") {
			config.gcp_metadata_endpoint = format!("http://{host}{GCP_METADATA_TOKEN_PATH}");
		}

		config
	}

	/// Per-request timeout, when configured.
	pub fn request_timeout(&self) -> Option<Duration> {
		self.request_timeout_ms.map(Duration::from_millis)
	}

	/// Sets the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));

		self
	}

	pub(crate) fn azure_authority_url(&self) -> Result<Url> {
		parse_endpoint("azure_authority", &self.azure_authority)
	}

	pub(crate) fn azure_imds_url(&self) -> Result<Url> {
		parse_endpoint("azure_imds_endpoint", &self.azure_imds_endpoint)
	}

	pub(crate) fn gcp_metadata_url(&self) -> Result<Url> {
		parse_endpoint("gcp_metadata_endpoint", &self.gcp_metadata_endpoint)
	}

	pub(crate) fn gcp_token_url(&self) -> Result<Url> {
		parse_endpoint("gcp_token_endpoint", &self.gcp_token_endpoint)
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			request_timeout_ms: None,
			azure_scheme: Scheme::Https,
			azure_authority: AZURE_AUTHORITY.into(),
			azure_imds_endpoint: AZURE_IMDS_ENDPOINT.into(),
			gcp_metadata_endpoint: format!("http://{GCP_METADATA_HOST}{GCP_METADATA_TOKEN_PATH}"),
			gcp_token_endpoint: GCP_TOKEN_ENDPOINT.into(),
		}
	}
}

pub(crate) fn non_empty_var(key: &str) -> Option<String> {
	env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source }.into())
}
