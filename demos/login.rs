//! Logs in to an Azure-style registry and a GCP registry served by local mock endpoints, then
//! prints the provider, username, and redacted credential for each image.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use registry_credential_broker::{
	broker::Broker,
	config::Scheme,
	credential::{StaticCredential, TokenCredential, gcp::MetadataServerCredential},
	http::ReqwestHttpClient,
	image::ImageReference,
	provider::{ProviderOptions, aws::EcrExchanger, azure::AcrExchanger, gcp::GcrExchanger},
	reqwest::Client,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let exchange_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/exchange");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"demo-acr-refresh\"}");
		})
		.await;
	let metadata_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/computeMetadata/v1/instance/service-accounts/default/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-gcp-access\",\"expires_in\":3599}");
		})
		.await;
	let http_client = ReqwestHttpClient::with_client(Client::builder().no_proxy().build()?);
	let metadata: Arc<dyn TokenCredential> = Arc::new(MetadataServerCredential::new(
		Url::parse(&format!(
			"http://{}/computeMetadata/v1/instance/service-accounts/default/token",
			server.address()
		))?,
		http_client.clone(),
	));
	let aad: Arc<dyn TokenCredential> = Arc::new(StaticCredential::new("demo-aad-access"));
	let broker = Broker::with_exchangers(
		EcrExchanger::new(None),
		GcrExchanger::with_credential(metadata),
		AcrExchanger::with_credential(http_client, Scheme::Http, aad),
	);
	let options =
		ProviderOptions { gcp_auto_login: true, azure_auto_login: true, ..Default::default() };
	let acr_image = format!("{}/team/app:v1", server.address());
	// The mock registry host is not an ACR host, so the Azure exchanger is called directly.
	let acr_login = broker
		.acr()
		.login(options.azure_auto_login, &acr_image, &acr_image.parse::<ImageReference>()?)
		.await?;

	println!("azure: username={} password={}", acr_login.username, acr_login.password);

	for image in ["gcr.io/demo-project/app:1.0", "docker.io/library/busybox"] {
		let reference = image.parse::<ImageReference>()?;
		let provider = broker.provider_for(image, &reference);

		match broker.login(image, &reference, &options).await? {
			Some(login) => println!(
				"{provider}: username={} password={}",
				login.username().unwrap_or_default(),
				login.secret()
			),
			None => println!("{provider}: no login required for {image}"),
		}
	}

	let disabled =
		broker.login_image("123456789012.dkr.ecr.us-east-1.amazonaws.com/app", &options).await;

	if let Err(err) = disabled {
		println!("aws: {err}");
	}

	exchange_mock.assert_async().await;
	metadata_mock.assert_async().await;

	Ok(())
}
