// std
use std::{io::Write, path::PathBuf};
// crates.io
use httpmock::prelude::*;
// self
use registry_credential_broker::{
	_preludet::*,
	config::BrokerConfig,
	credential::{
		CredentialError, TokenCredential,
		gcp::{
			AuthorizedUserCredential, CLOUD_PLATFORM_SCOPE, GcpEnvironment,
			MetadataServerCredential, default_gcp_credential_from,
		},
	},
	provider::{
		ProviderKind,
		gcp::{ACCESS_TOKEN_USERNAME, GcrExchanger},
	},
};

const METADATA_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

fn metadata_credential(server: &MockServer) -> Arc<dyn TokenCredential> {
	let endpoint = Url::parse(&mock_url(server.address(), METADATA_PATH))
		.expect("Mock metadata endpoint should parse.");

	Arc::new(MetadataServerCredential::new(endpoint, test_reqwest_http_client()))
}

fn credentials_file(name: &str, contents: &str) -> PathBuf {
	let path = std::env::temp_dir()
		.join(format!("registry-credential-broker-it-{}-{name}", std::process::id()));
	let mut file = std::fs::File::create(&path).expect("Credentials file should be created.");

	file.write_all(contents.as_bytes()).expect("Credentials file should be written.");

	path
}

#[tokio::test]
async fn metadata_token_becomes_registry_password() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH).header("metadata-flavor", "Google");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"ya29.metadata\",\"expires_in\":3599,\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	let exchanger = GcrExchanger::with_credential(metadata_credential(&server));
	let image = "us-docker.pkg.dev/project/repo/app:1.2.3";
	let config = exchanger
		.login(true, image, &test_reference(image))
		.await
		.expect("GCP login should succeed.");

	assert_eq!(config.username, ACCESS_TOKEN_USERNAME);
	assert_eq!(config.password.expose(), "ya29.metadata");

	mock.assert_async().await;
}

#[tokio::test]
async fn metadata_failure_surfaces_as_credential_error() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(404).body("service account not found");
		})
		.await;
	let exchanger = GcrExchanger::with_credential(metadata_credential(&server));
	let image = "gcr.io/project/app";
	let err = exchanger
		.login(true, image, &test_reference(image))
		.await
		.expect_err("Metadata failures should propagate.");

	match err {
		Error::Credential {
			provider: ProviderKind::Gcp,
			source: CredentialError::Rejected { status: Some(404), detail, .. },
		} => assert_eq!(detail, "service account not found"),
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn malformed_metadata_body_reports_json_path() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(200).body("{\"access_token\":42}");
		})
		.await;
	let err = metadata_credential(&server)
		.get_token(&[CLOUD_PLATFORM_SCOPE])
		.await
		.expect_err("Malformed bodies should fail.");

	assert!(matches!(
		err,
		CredentialError::Decode { credential: "metadata-server", ref path, category: "data" }
			if path == "access_token"
	));
}

#[tokio::test]
async fn authorized_user_file_uses_refresh_grant() {
	let server = MockServer::start_async().await;
	let path = credentials_file(
		"authorized-user.json",
		"{\"type\":\"authorized_user\",\"client_id\":\"cid\",\"client_secret\":\"csecret\",\"refresh_token\":\"rtoken\"}",
	);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "rtoken")
				.form_urlencoded_tuple("client_id", "cid");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"ya29.user\",\"token_type\":\"bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let credential = AuthorizedUserCredential::new(
		path.clone(),
		Url::parse(&mock_url(server.address(), "/token"))
			.expect("Mock token endpoint should parse."),
		test_reqwest_http_client(),
	);
	let token = credential
		.get_token(&[CLOUD_PLATFORM_SCOPE])
		.await
		.expect("Refresh grant should succeed.");

	assert_eq!(token.token.expose(), "ya29.user");

	mock.assert_async().await;

	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn default_chain_reaches_configured_metadata_server() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH).header("metadata-flavor", "Google");
			then.status(200).body("{\"access_token\":\"ya29.default\",\"expires_in\":60}");
		})
		.await;
	let config = BrokerConfig {
		gcp_metadata_endpoint: mock_url(server.address(), METADATA_PATH),
		..BrokerConfig::default()
	};
	let env = GcpEnvironment {
		application_credentials: Some(PathBuf::from(
			"/nonexistent/registry-credential-broker/adc.json",
		)),
	};
	let chain = default_gcp_credential_from(&env, &config, test_reqwest_http_client())
		.expect("Default chain should build.");
	let token = chain.get_token(&[CLOUD_PLATFORM_SCOPE]).await.expect("Chain should fall through.");

	assert_eq!(token.token.expose(), "ya29.default");

	mock.assert_async().await;
}
