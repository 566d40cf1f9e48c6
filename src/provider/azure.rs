//! Azure Container Registry login.
//!
//! Two hops: an AAD access token for Azure Resource Manager from a [`TokenCredential`], then
//! the registry's `/oauth2/exchange` endpoint trades it for an ACR refresh token. The refresh
//! token is the registry password; the username is a fixed sentinel.

// self
use crate::{
	_prelude::*,
	auth::{AuthConfig, TokenSecret},
	config::{BrokerConfig, Scheme},
	credential::{CredentialFactory, LazyCredential, TokenCredential, azure::ARM_SCOPE},
	error::{ConfigError, TransportError},
	http::{self, ReqwestHttpClient},
	image::ImageReference,
	provider::ProviderKind,
};

/// Username ACR expects alongside an exchanged refresh token.
pub const SENTINEL_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

const ACR_SUFFIXES: [&str; 4] = [".azurecr.io", ".azurecr.cn", ".azurecr.de", ".azurecr.us"];

/// Returns `true` when `host` is an Azure Container Registry host.
pub fn valid_host(host: &str) -> bool {
	ACR_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

#[derive(Deserialize)]
struct ExchangeResponse {
	refresh_token: String,
}

#[derive(Deserialize)]
struct ExchangeErrorEntry {
	#[serde(default)]
	code: Option<String>,
	message: String,
}

/// Exchanges ambient Azure identity for an ACR login.
pub struct AcrExchanger {
	http_client: ReqwestHttpClient,
	scheme: Scheme,
	credential: LazyCredential,
}
impl AcrExchanger {
	/// Creates an exchanger using the default Azure credential chain and HTTPS.
	pub fn new(http_client: ReqwestHttpClient) -> Self {
		Self::from_config(http_client, &BrokerConfig::default())
	}

	/// Creates an exchanger whose default chain and scheme follow `config`.
	pub fn from_config(http_client: ReqwestHttpClient, config: &BrokerConfig) -> Self {
		let chain_config = config.clone();
		let chain_client = http_client.clone();
		let factory: CredentialFactory = Arc::new(move || {
			let chain = crate::credential::azure::default_azure_credential(
				&chain_config,
				chain_client.clone(),
			)?;

			Ok(Arc::new(chain) as Arc<dyn TokenCredential>)
		});

		Self::with_credential_factory(http_client, config.azure_scheme, factory)
	}

	/// Creates an exchanger using an injected credential.
	pub fn with_credential(
		http_client: ReqwestHttpClient,
		scheme: Scheme,
		credential: Arc<dyn TokenCredential>,
	) -> Self {
		Self { http_client, scheme, credential: LazyCredential::fixed(credential) }
	}

	/// Creates an exchanger that builds its credential with `factory` on first use.
	pub fn with_credential_factory(
		http_client: ReqwestHttpClient,
		scheme: Scheme,
		factory: CredentialFactory,
	) -> Self {
		Self { http_client, scheme, credential: LazyCredential::deferred(factory) }
	}

	/// Returns `true` once the credential is available without construction.
	pub fn credential_initialized(&self) -> bool {
		self.credential.is_initialized()
	}

	/// Obtains a registry login for the registry hosting `reference`.
	///
	/// Fails with [`Error::UnconfiguredProvider`] when `auto_login` is off, before any
	/// credential is constructed.
	pub async fn login(
		&self,
		auto_login: bool,
		image: &str,
		reference: &ImageReference,
	) -> Result<AuthConfig> {
		if !auto_login {
			return Err(Error::unconfigured(ProviderKind::Azure));
		}

		let credential = self.credential.resolve().await?;
		let access_token = credential
			.get_token(&[ARM_SCOPE])
			.await
			.map_err(|err| Error::credential(ProviderKind::Azure, err))?;

		tracing::debug!(
			image,
			credential = credential.kind(),
			"Obtained AAD access token; exchanging for an ACR refresh token."
		);

		let refresh_token = self.exchange(reference.registry(), &access_token.token).await?;

		Ok(AuthConfig { username: SENTINEL_USERNAME.into(), password: refresh_token })
	}

	async fn exchange(&self, registry: &str, access_token: &TokenSecret) -> Result<TokenSecret> {
		let endpoint = Url::parse(&format!("{}://{registry}/oauth2/exchange", self.scheme))
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "acr_exchange", source })?;

		exchange_refresh_token(&self.http_client, endpoint, registry, access_token).await
	}
}
impl Debug for AcrExchanger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AcrExchanger")
			.field("scheme", &self.scheme)
			.field("credential", &self.credential)
			.finish()
	}
}

/// Trades an AAD access token for an ACR refresh token at `endpoint`.
pub async fn exchange_refresh_token(
	http_client: &ReqwestHttpClient,
	endpoint: Url,
	service: &str,
	access_token: &TokenSecret,
) -> Result<TokenSecret> {
	let form = [
		("grant_type", "access_token"),
		("service", service),
		("access_token", access_token.expose()),
	];
	let response = http_client
		.post(endpoint)
		.form(&form)
		.send()
		.await
		.map_err(|err| TransportError::network("acr_exchange", err))?;
	let status = response.status();
	let body =
		response.bytes().await.map_err(|err| TransportError::network("acr_exchange", err))?;

	if !status.is_success() {
		return Err(Error::ExchangeHttp { status: status.as_u16(), detail: error_detail(&body) });
	}

	let mut de = serde_json::Deserializer::from_slice(&body);
	let parsed: ExchangeResponse =
		serde_path_to_error::deserialize(&mut de).map_err(Error::exchange_decode)?;

	Ok(TokenSecret::new(parsed.refresh_token))
}

fn error_detail(body: &[u8]) -> String {
	match serde_json::from_slice::<Vec<ExchangeErrorEntry>>(body) {
		Ok(entries) if !entries.is_empty() => entries
			.into_iter()
			.map(|entry| match entry.code {
				Some(code) => format!("{code}: {}", entry.message),
				None => entry.message,
			})
			.collect::<Vec<_>>()
			.join("; "),
		_ => http::body_preview(body),
	}
}
