//! Credential broker dispatching logins to the exchanger of the owning provider.
//!
//! The broker owns one exchanger per provider and no other state. Each exchanger builds its
//! ambient credential on first use and never caches the tokens it mints, so every
//! [`Broker::login`] reaches the provider. Share one broker across tasks with `Arc<Broker>`.

// self
use crate::{
	_prelude::*,
	auth::Authenticator,
	config::BrokerConfig,
	http::ReqwestHttpClient,
	image::ImageReference,
	obs::{self, LoginOutcome, LoginSpan},
	provider::{
		self, ProviderKind, ProviderOptions, aws::EcrExchanger, azure::AcrExchanger,
		gcp::GcrExchanger,
	},
};

/// Multi-cloud registry credential broker.
#[derive(Debug)]
pub struct Broker {
	ecr: EcrExchanger,
	gcr: GcrExchanger,
	acr: AcrExchanger,
}
impl Broker {
	/// Creates a broker configured from the process environment.
	pub fn new() -> Result<Self> {
		Self::from_config(&BrokerConfig::from_env())
	}

	/// Creates a broker whose exchangers follow `config`.
	pub fn from_config(config: &BrokerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout())?;

		Ok(Self::with_exchangers(
			EcrExchanger::new(config.request_timeout()),
			GcrExchanger::from_config(http_client.clone(), config),
			AcrExchanger::from_config(http_client, config),
		))
	}

	/// Assembles a broker from pre-built exchangers.
	pub fn with_exchangers(ecr: EcrExchanger, gcr: GcrExchanger, acr: AcrExchanger) -> Self {
		Self { ecr, gcr, acr }
	}

	/// Returns the provider that owns `image`.
	pub fn provider_for(&self, image: &str, reference: &ImageReference) -> ProviderKind {
		provider::classify(image, reference)
	}

	/// Returns the ECR exchanger.
	pub fn ecr(&self) -> &EcrExchanger {
		&self.ecr
	}

	/// Returns the GCR exchanger.
	pub fn gcr(&self) -> &GcrExchanger {
		&self.gcr
	}

	/// Returns the ACR exchanger.
	pub fn acr(&self) -> &AcrExchanger {
		&self.acr
	}

	/// Parses `image` and logs in to its registry.
	pub async fn login_image(
		&self,
		image: &str,
		options: &ProviderOptions,
	) -> Result<Option<Authenticator>> {
		let reference = image.parse::<ImageReference>()?;

		self.login(image, &reference, options).await
	}

	/// Obtains a credential for the registry hosting `image`.
	///
	/// Returns `Ok(None)` for generic registries, which need either no credential or one the
	/// caller already holds. Exchanger failures propagate unchanged; a provider whose
	/// autologin option is off yields [`Error::UnconfiguredProvider`].
	pub async fn login(
		&self,
		image: &str,
		reference: &ImageReference,
		options: &ProviderOptions,
	) -> Result<Option<Authenticator>> {
		let provider = self.provider_for(image, reference);
		let span = LoginSpan::new(provider, "login");

		obs::record_login_outcome(provider, LoginOutcome::Attempt);

		let result = span
			.instrument(async move {
				let auto_login = options.enabled(provider);
				let config = match provider {
					ProviderKind::Generic => {
						tracing::info!(%provider, image, "No provider login required.");

						return Ok(None);
					},
					ProviderKind::Aws => {
						tracing::info!(%provider, image, "Logging in to AWS ECR.");

						self.ecr.login(auto_login, image).await
					},
					ProviderKind::Gcp => {
						tracing::info!(%provider, image, "Logging in to GCP registry.");

						self.gcr.login(auto_login, image, reference).await
					},
					ProviderKind::Azure => {
						tracing::info!(%provider, image, "Logging in to Azure ACR.");

						self.acr.login(auto_login, image, reference).await
					},
				};

				match config {
					Ok(config) => Ok(Some(Authenticator::Basic(config))),
					Err(err) if err.is_unconfigured() => {
						tracing::info!(
							%provider,
							image,
							flag = provider.autologin_flag(),
							"Registry authentication is not enabled for this provider."
						);

						Err(err)
					},
					Err(err) => {
						tracing::info!(%provider, image, error = %err, "Registry login failed.");

						Err(err)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_login_outcome(provider, LoginOutcome::Success),
			Err(_) => obs::record_login_outcome(provider, LoginOutcome::Failure),
		}

		result
	}
}
