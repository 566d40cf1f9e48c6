//! Azure Active Directory credential sources and the default ambient chain.
//!
//! The default chain tries, in order: a client secret from the environment, the instance
//! metadata managed identity endpoint, and a federated workload identity token file.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	config::{BrokerConfig, non_empty_var},
	credential::{
		AccessToken, ChainedCredential, CredentialError, CredentialFuture, TokenCredential,
		fetch_json, oauth::OAuthTokenEndpoint,
	},
	error::ConfigError,
	http::ReqwestHttpClient,
};

/// Scope for Azure Resource Manager in the public cloud; the ACR exchange accepts tokens
/// issued for it.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

const IMDS_API_VERSION: &str = "2018-02-01";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Azure identity settings read from the process environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AzureEnvironment {
	/// `AZURE_TENANT_ID`.
	pub tenant_id: Option<String>,
	/// `AZURE_CLIENT_ID`.
	pub client_id: Option<String>,
	/// `AZURE_CLIENT_SECRET`.
	pub client_secret: Option<String>,
	/// `AZURE_FEDERATED_TOKEN_FILE`.
	pub federated_token_file: Option<PathBuf>,
}
impl AzureEnvironment {
	/// Snapshots the Azure identity variables.
	pub fn from_env() -> Self {
		Self {
			tenant_id: non_empty_var("AZURE_TENANT_ID"),
			client_id: non_empty_var("AZURE_CLIENT_ID"),
			client_secret: non_empty_var("AZURE_CLIENT_SECRET"),
			federated_token_file: non_empty_var("AZURE_FEDERATED_TOKEN_FILE").map(PathBuf::from),
		}
	}
}
impl Debug for AzureEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AzureEnvironment")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("federated_token_file", &self.federated_token_file)
			.finish()
	}
}

/// Builds the default ambient chain from the process environment.
pub fn default_azure_credential(
	config: &BrokerConfig,
	http_client: ReqwestHttpClient,
) -> Result<ChainedCredential> {
	default_azure_credential_from(&AzureEnvironment::from_env(), config, http_client)
}

/// Builds the default chain from an explicit environment snapshot.
///
/// Sources whose settings are absent are left out; the managed identity source is always
/// present because its availability is only known by asking the endpoint.
pub fn default_azure_credential_from(
	env: &AzureEnvironment,
	config: &BrokerConfig,
	http_client: ReqwestHttpClient,
) -> Result<ChainedCredential> {
	let authority = config.azure_authority_url()?;
	let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();

	if let (Some(tenant_id), Some(client_id), Some(client_secret)) =
		(&env.tenant_id, &env.client_id, &env.client_secret)
	{
		sources.push(Arc::new(ClientSecretCredential::new(
			&authority,
			tenant_id,
			client_id,
			client_secret,
			http_client.clone(),
		)?));
	}

	sources.push(Arc::new(ManagedIdentityCredential::new(
		config.azure_imds_url()?,
		env.client_id.clone(),
		http_client.clone(),
	)));

	if let (Some(tenant_id), Some(client_id), Some(token_file)) =
		(&env.tenant_id, &env.client_id, &env.federated_token_file)
	{
		sources.push(Arc::new(WorkloadIdentityCredential::new(
			&authority,
			tenant_id,
			client_id,
			token_file.clone(),
			http_client,
		)?));
	}

	tracing::debug!(
		environment = ?env,
		sources = sources.len(),
		"Built Azure credential chain."
	);

	Ok(ChainedCredential::new("azure-default", sources))
}

fn tenant_token_url(authority: &Url, tenant_id: &str) -> Result<Url> {
	let mut authority = authority.clone();

	if !authority.path().ends_with('/') {
		let path = format!("{}/", authority.path());

		authority.set_path(&path);
	}

	authority
		.join(&format!("{tenant_id}/oauth2/v2.0/token"))
		.map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: "azure_authority", source }.into()
		})
}

/// Service principal authenticating with a client secret (`client_credentials` grant).
pub struct ClientSecretCredential {
	endpoint: OAuthTokenEndpoint,
}
impl ClientSecretCredential {
	/// Creates a credential for the service principal in `tenant_id`.
	pub fn new(
		authority: &Url,
		tenant_id: &str,
		client_id: &str,
		client_secret: &str,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let token_url = tenant_token_url(authority, tenant_id)?;

		Ok(Self {
			endpoint: OAuthTokenEndpoint::new(
				"environment",
				token_url,
				client_id,
				Some(client_secret),
				http_client,
			),
		})
	}
}
impl TokenCredential for ClientSecretCredential {
	fn kind(&self) -> &'static str {
		"environment"
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move { self.endpoint.client_credentials(scopes, &[]).await })
	}
}

/// Federated workload identity: a projected service-account token exchanged as a client
/// assertion.
pub struct WorkloadIdentityCredential {
	endpoint: OAuthTokenEndpoint,
	token_file: PathBuf,
}
impl WorkloadIdentityCredential {
	/// Creates a credential reading its assertion from `token_file` on every request.
	pub fn new(
		authority: &Url,
		tenant_id: &str,
		client_id: &str,
		token_file: PathBuf,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let token_url = tenant_token_url(authority, tenant_id)?;

		Ok(Self {
			endpoint: OAuthTokenEndpoint::new(
				"workload-identity",
				token_url,
				client_id,
				None,
				http_client,
			),
			token_file,
		})
	}

	fn read_assertion(&self) -> Result<String, CredentialError> {
		// Blocking read; token files are a few KB.
		let assertion = std::fs::read_to_string(&self.token_file).map_err(|source| {
			CredentialError::Io {
				credential: "workload-identity",
				path: self.token_file.display().to_string(),
				source,
			}
		})?;
		let assertion = assertion.trim();

		if assertion.is_empty() {
			return Err(CredentialError::Unavailable {
				credential: "workload-identity",
				reason: format!("token file `{}` is empty", self.token_file.display()),
			});
		}

		Ok(assertion.to_owned())
	}
}
impl TokenCredential for WorkloadIdentityCredential {
	fn kind(&self) -> &'static str {
		"workload-identity"
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			let assertion = self.read_assertion()?;

			self.endpoint
				.client_credentials(
					scopes,
					&[
						("client_assertion_type", CLIENT_ASSERTION_TYPE),
						("client_assertion", assertion.as_str()),
					],
				)
				.await
		})
	}
}

#[derive(Deserialize)]
struct ManagedIdentityToken {
	access_token: String,
	#[serde(default)]
	expires_on: Option<serde_json::Value>,
}

/// Managed identity served by the Azure instance metadata endpoint.
pub struct ManagedIdentityCredential {
	endpoint: Url,
	client_id: Option<String>,
	http_client: ReqwestHttpClient,
}
impl ManagedIdentityCredential {
	/// Creates a credential for the system-assigned identity, or the user-assigned identity
	/// named by `client_id`.
	pub fn new(endpoint: Url, client_id: Option<String>, http_client: ReqwestHttpClient) -> Self {
		Self { endpoint, client_id, http_client }
	}
}
impl TokenCredential for ManagedIdentityCredential {
	fn kind(&self) -> &'static str {
		"managed-identity"
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			let scope = scopes.first().copied().unwrap_or(ARM_SCOPE);
			let resource = scope.strip_suffix(".default").unwrap_or(scope);
			let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];

			if let Some(client_id) = &self.client_id {
				query.push(("client_id", client_id.as_str()));
			}

			let request = self
				.http_client
				.get(self.endpoint.clone())
				.query(&query)
				.header("Metadata", "true");
			let body: ManagedIdentityToken = fetch_json("managed-identity", request).await?;
			let token = AccessToken::new(body.access_token);
			let expires_on = body.expires_on.as_ref().and_then(|value| match value {
				serde_json::Value::String(raw) => raw.parse::<i64>().ok(),
				serde_json::Value::Number(raw) => raw.as_i64(),
				_ => None,
			});

			Ok(match expires_on {
				Some(timestamp) => token.expiring_at_unix(timestamp),
				None => token,
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::default()
	}

	#[test]
	fn chain_includes_only_configured_sources() {
		let config = BrokerConfig::default();
		let chain =
			default_azure_credential_from(&AzureEnvironment::default(), &config, http_client())
				.expect("Chain should build.");

		assert_eq!(chain.source_kinds(), vec!["managed-identity"]);

		let env = AzureEnvironment {
			tenant_id: Some("tenant".into()),
			client_id: Some("client".into()),
			client_secret: Some("secret".into()),
			federated_token_file: Some(PathBuf::from("/var/run/secrets/azure/tokens/token")),
		};
		let chain = default_azure_credential_from(&env, &config, http_client())
			.expect("Chain should build.");

		assert_eq!(
			chain.source_kinds(),
			vec!["environment", "managed-identity", "workload-identity"]
		);
	}

	#[test]
	fn tenant_token_url_joins_authority() {
		let authority =
			Url::parse(crate::config::AZURE_AUTHORITY).expect("Authority should parse.");

		assert_eq!(
			tenant_token_url(&authority, "my-tenant").expect("Token URL should build.").as_str(),
			"https://login.microsoftonline.com/my-tenant/oauth2/v2.0/token"
		);

		let nested = Url::parse("http://127.0.0.1:8080/aad").expect("Authority should parse.");

		assert_eq!(
			tenant_token_url(&nested, "t").expect("Token URL should build.").as_str(),
			"http://127.0.0.1:8080/aad/t/oauth2/v2.0/token"
		);
	}

	#[test]
	fn environment_debug_hides_secret() {
		let env = AzureEnvironment { client_secret: Some("hunter2".into()), ..Default::default() };
		let rendered = format!("{env:?}");

		assert!(rendered.contains("client_secret_set: true"));
		assert!(!rendered.contains("hunter2"));
	}

	#[tokio::test]
	async fn workload_identity_requires_token_file() {
		let authority =
			Url::parse(crate::config::AZURE_AUTHORITY).expect("Authority should parse.");
		let credential = WorkloadIdentityCredential::new(
			&authority,
			"tenant",
			"client",
			PathBuf::from("/nonexistent/registry-credential-broker/token"),
			http_client(),
		)
		.expect("Credential should build.");
		let err = credential.get_token(&[ARM_SCOPE]).await.expect_err("Missing file should fail.");

		assert!(matches!(err, CredentialError::Io { credential: "workload-identity", .. }));
	}
}
