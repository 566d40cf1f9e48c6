//! Google Container Registry and Artifact Registry login.

// self
use crate::{
	_prelude::*,
	auth::AuthConfig,
	config::BrokerConfig,
	credential::{
		CredentialFactory, LazyCredential, TokenCredential, gcp::CLOUD_PLATFORM_SCOPE,
	},
	http::ReqwestHttpClient,
	image::ImageReference,
	provider::ProviderKind,
};

/// Username Google registries expect alongside an OAuth 2.0 access token.
pub const ACCESS_TOKEN_USERNAME: &str = "oauth2accesstoken";

/// Returns `true` when `host` is a Container Registry or Artifact Registry host.
pub fn valid_host(host: &str) -> bool {
	host == "gcr.io" || host.ends_with(".gcr.io") || host.ends_with("-docker.pkg.dev")
}

/// Exchanges ambient Google identity for a registry login.
pub struct GcrExchanger {
	credential: LazyCredential,
}
impl GcrExchanger {
	/// Creates an exchanger using the default Google credential chain.
	pub fn new(http_client: ReqwestHttpClient) -> Self {
		Self::from_config(http_client, &BrokerConfig::default())
	}

	/// Creates an exchanger whose default chain follows `config`.
	pub fn from_config(http_client: ReqwestHttpClient, config: &BrokerConfig) -> Self {
		let chain_config = config.clone();
		let factory: CredentialFactory = Arc::new(move || {
			let chain = crate::credential::gcp::default_gcp_credential(
				&chain_config,
				http_client.clone(),
			)?;

			Ok(Arc::new(chain) as Arc<dyn TokenCredential>)
		});

		Self::with_credential_factory(factory)
	}

	/// Creates an exchanger using an injected credential.
	pub fn with_credential(credential: Arc<dyn TokenCredential>) -> Self {
		Self { credential: LazyCredential::fixed(credential) }
	}

	/// Creates an exchanger that builds its credential with `factory` on first use.
	pub fn with_credential_factory(factory: CredentialFactory) -> Self {
		Self { credential: LazyCredential::deferred(factory) }
	}

	/// Returns `true` once the credential is available without construction.
	pub fn credential_initialized(&self) -> bool {
		self.credential.is_initialized()
	}

	/// Obtains a registry login; the access token itself is the password.
	pub async fn login(
		&self,
		auto_login: bool,
		image: &str,
		reference: &ImageReference,
	) -> Result<AuthConfig> {
		if !auto_login {
			return Err(Error::unconfigured(ProviderKind::Gcp));
		}

		let credential = self.credential.resolve().await?;
		let access_token = credential
			.get_token(&[CLOUD_PLATFORM_SCOPE])
			.await
			.map_err(|err| Error::credential(ProviderKind::Gcp, err))?;

		tracing::debug!(
			image,
			registry = reference.registry(),
			credential = credential.kind(),
			"Obtained Google access token."
		);

		Ok(AuthConfig { username: ACCESS_TOKEN_USERNAME.into(), password: access_token.token })
	}
}
impl Debug for GcrExchanger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GcrExchanger").field("credential", &self.credential).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::credential::StaticCredential;

	#[test]
	fn valid_host_matches_google_registries() {
		assert!(valid_host("gcr.io"));
		assert!(valid_host("eu.gcr.io"));
		assert!(valid_host("us-central1-docker.pkg.dev"));
		assert!(!valid_host("notgcr.io"));
		assert!(!valid_host("docker.pkg.dev"));
		assert!(!valid_host("foo.azurecr.io"));
	}

	#[tokio::test]
	async fn login_maps_access_token_to_password() {
		let credential = Arc::new(StaticCredential::new("ya29.token"));
		let exchanger = GcrExchanger::with_credential(credential);
		let reference = "gcr.io/project/app".parse().expect("Reference should parse.");
		let config = exchanger
			.login(true, "gcr.io/project/app", &reference)
			.await
			.expect("Login should succeed.");

		assert_eq!(config.username, ACCESS_TOKEN_USERNAME);
		assert_eq!(config.password.expose(), "ya29.token");
	}

	#[tokio::test]
	async fn credential_failure_names_the_provider() {
		let exchanger =
			GcrExchanger::with_credential(Arc::new(StaticCredential::failing("metadata down")));
		let reference = "gcr.io/project/app".parse().expect("Reference should parse.");
		let err = exchanger
			.login(true, "gcr.io/project/app", &reference)
			.await
			.expect_err("Login should fail.");

		assert!(matches!(err, Error::Credential { provider: ProviderKind::Gcp, .. }));
		assert!(matches!(
			GcrExchanger::with_credential(Arc::new(StaticCredential::new("t")))
				.login(false, "gcr.io/project/app", &reference)
				.await,
			Err(Error::UnconfiguredProvider { provider: ProviderKind::Gcp })
		));
	}
}
