//! Google application default credentials.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	config::{BrokerConfig, non_empty_var},
	credential::{
		AccessToken, ChainedCredential, CredentialError, CredentialFuture, TokenCredential,
		fetch_json, oauth::OAuthTokenEndpoint,
	},
	http::ReqwestHttpClient,
};

/// Scope requested when a caller passes none.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Google identity settings read from the process environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcpEnvironment {
	/// `GOOGLE_APPLICATION_CREDENTIALS`.
	pub application_credentials: Option<PathBuf>,
}
impl GcpEnvironment {
	/// Snapshots the Google identity variables.
	pub fn from_env() -> Self {
		Self {
			application_credentials: non_empty_var("GOOGLE_APPLICATION_CREDENTIALS")
				.map(PathBuf::from),
		}
	}
}

/// Builds the default chain from the process environment.
pub fn default_gcp_credential(
	config: &BrokerConfig,
	http_client: ReqwestHttpClient,
) -> Result<ChainedCredential> {
	default_gcp_credential_from(&GcpEnvironment::from_env(), config, http_client)
}

/// Builds the default chain: the application default credentials file, when one is named,
/// followed by the metadata server.
pub fn default_gcp_credential_from(
	env: &GcpEnvironment,
	config: &BrokerConfig,
	http_client: ReqwestHttpClient,
) -> Result<ChainedCredential> {
	let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();

	if let Some(path) = &env.application_credentials {
		sources.push(Arc::new(AuthorizedUserCredential::new(
			path.clone(),
			config.gcp_token_url()?,
			http_client.clone(),
		)));
	}

	sources.push(Arc::new(MetadataServerCredential::new(
		config.gcp_metadata_url()?,
		http_client,
	)));

	Ok(ChainedCredential::new("gcp-default", sources))
}

#[derive(Deserialize)]
struct CredentialsFile {
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	client_id: Option<String>,
	#[serde(default)]
	client_secret: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// `authorized_user` credentials file, as written by `gcloud auth application-default login`.
///
/// The file is read on every request; its refresh token is exchanged at the OAuth 2.0 token
/// endpoint.
pub struct AuthorizedUserCredential {
	path: PathBuf,
	token_url: Url,
	http_client: ReqwestHttpClient,
}
impl AuthorizedUserCredential {
	/// Creates a credential backed by the file at `path`.
	pub fn new(path: PathBuf, token_url: Url, http_client: ReqwestHttpClient) -> Self {
		Self { path, token_url, http_client }
	}

	fn load(path: &Path) -> Result<CredentialsFile, CredentialError> {
		// Blocking read; token files are a few KB.
		let raw = std::fs::read(path).map_err(|source| CredentialError::Io {
			credential: "authorized-user",
			path: path.display().to_string(),
			source,
		})?;
		let mut de = serde_json::Deserializer::from_slice(&raw);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|err| CredentialError::decode("authorized-user", &err))
	}
}
impl TokenCredential for AuthorizedUserCredential {
	fn kind(&self) -> &'static str {
		"authorized-user"
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			let file = Self::load(&self.path)?;

			if file.kind != "authorized_user" {
				return Err(CredentialError::UnsupportedKeyType { kind: file.kind });
			}

			let (Some(client_id), Some(refresh_token)) = (file.client_id, file.refresh_token)
			else {
				return Err(CredentialError::Unavailable {
					credential: "authorized-user",
					reason: format!(
						"`{}` lacks `client_id` or `refresh_token`",
						self.path.display()
					),
				});
			};
			let endpoint = OAuthTokenEndpoint::new(
				"authorized-user",
				self.token_url.clone(),
				&client_id,
				file.client_secret.as_deref(),
				self.http_client.clone(),
			);

			endpoint.refresh_token(&refresh_token, scopes).await
		})
	}
}

#[derive(Deserialize)]
struct MetadataToken {
	access_token: String,
	#[serde(default)]
	expires_in: Option<u64>,
}

/// Default service account of the instance, served by the GCE metadata server.
pub struct MetadataServerCredential {
	endpoint: Url,
	http_client: ReqwestHttpClient,
}
impl MetadataServerCredential {
	/// Creates a credential querying `endpoint`.
	pub fn new(endpoint: Url, http_client: ReqwestHttpClient) -> Self {
		Self { endpoint, http_client }
	}
}
impl TokenCredential for MetadataServerCredential {
	fn kind(&self) -> &'static str {
		"metadata-server"
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			let mut request =
				self.http_client.get(self.endpoint.clone()).header("Metadata-Flavor", "Google");

			if !scopes.is_empty() && scopes != [CLOUD_PLATFORM_SCOPE] {
				request = request.query(&[("scopes", scopes.join(","))]);
			}

			let body: MetadataToken = fetch_json("metadata-server", request).await?;
			let token = AccessToken::new(body.access_token);

			Ok(match body.expires_in {
				Some(lifetime) => token.expiring_in(lifetime),
				None => token,
			})
		})
	}
}
