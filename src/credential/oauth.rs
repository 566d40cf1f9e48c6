//! OAuth 2.0 token-endpoint facade shared by the client-secret, workload-identity, and
//! authorized-user credentials.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	credential::{AccessToken, CredentialError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type TokenEndpointClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token endpoint bound to one client identity.
pub(crate) struct OAuthTokenEndpoint {
	credential: &'static str,
	oauth_client: TokenEndpointClient,
	http_client: ReqwestHttpClient,
}
impl OAuthTokenEndpoint {
	/// Binds `client_id` (and optional secret) to `token_url`; client authentication travels in
	/// the request body.
	pub(crate) fn new(
		credential: &'static str,
		token_url: Url,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: ReqwestHttpClient,
	) -> Self {
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(TokenUrl::from_url(token_url))
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Self { credential, oauth_client, http_client }
	}

	/// Performs the `client_credentials` grant.
	pub(crate) async fn client_credentials(
		&self,
		scopes: &[&str],
		extra_params: &[(&str, &str)],
	) -> Result<AccessToken, CredentialError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for scope in scopes {
			request = request.add_scope(Scope::new((*scope).to_owned()));
		}
		for (key, value) in extra_params {
			request = request.add_extra_param(*key, *value);
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(self.credential, meta.take(), err))?;

		Ok(access_token_from(&response))
	}

	/// Performs the `refresh_token` grant.
	pub(crate) async fn refresh_token(
		&self,
		refresh_token: &str,
		scopes: &[&str],
	) -> Result<AccessToken, CredentialError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

		for scope in scopes {
			request = request.add_scope(Scope::new((*scope).to_owned()));
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(self.credential, meta.take(), err))?;

		Ok(access_token_from(&response))
	}
}

fn access_token_from(response: &BasicTokenResponse) -> AccessToken {
	let token = AccessToken::new(response.access_token().secret().to_owned());

	match response.expires_in() {
		Some(lifetime) => token.expiring_in(lifetime.as_secs()),
		None => token,
	}
}

fn map_request_error(
	credential: &'static str,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> CredentialError {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(credential, status, &response),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			CredentialError::transport(credential, *inner),
		RequestTokenError::Request(HttpClientError::Io(inner)) =>
			CredentialError::transport(credential, inner),
		RequestTokenError::Request(HttpClientError::Http(inner)) =>
			CredentialError::transport(credential, inner),
		RequestTokenError::Request(other) => CredentialError::Rejected {
			credential,
			status,
			detail: format!("HTTP client error: {other}"),
		},
		RequestTokenError::Parse(error, _body) => CredentialError::decode(credential, &error),
		RequestTokenError::Other(message) =>
			CredentialError::Rejected { credential, status, detail: message },
	}
}

fn map_server_response_error(
	credential: &'static str,
	status: Option<u16>,
	response: &BasicErrorResponse,
) -> CredentialError {
	let detail = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	CredentialError::Rejected { credential, status, detail }
}
