//! Username/password pairs and the authenticator abstraction consumed by registry clients.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Short-lived registry login produced by an exchanger.
///
/// Lives only for the registry call it was minted for; nothing in the crate stores it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
	/// Registry username (often a provider-defined sentinel).
	pub username: String,
	/// Registry password or token.
	pub password: TokenSecret,
}
impl AuthConfig {
	/// Creates a new username/password pair.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: TokenSecret::new(password) }
	}
}
impl Debug for AuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthConfig")
			.field("username", &self.username)
			.field("password", &self.password)
			.finish()
	}
}

/// Credential handed to the downstream registry client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authenticator {
	/// HTTP basic credentials.
	Basic(AuthConfig),
	/// Bearer identity token.
	Bearer(TokenSecret),
}
impl Authenticator {
	/// Returns the username for basic credentials.
	pub fn username(&self) -> Option<&str> {
		match self {
			Self::Basic(config) => Some(&config.username),
			Self::Bearer(_) => None,
		}
	}

	/// Returns the secret half of the credential.
	pub fn secret(&self) -> &TokenSecret {
		match self {
			Self::Basic(config) => &config.password,
			Self::Bearer(token) => token,
		}
	}

	/// Renders the `Authorization` header value for this credential.
	pub fn authorization_header(&self) -> TokenSecret {
		match self {
			Self::Basic(config) => {
				let raw = format!("{}:{}", config.username, config.password.expose());

				TokenSecret::new(format!("Basic {}", STANDARD.encode(raw)))
			},
			Self::Bearer(token) => TokenSecret::new(format!("Bearer {}", token.expose())),
		}
	}
}
impl From<AuthConfig> for Authenticator {
	fn from(config: AuthConfig) -> Self {
		Self::Basic(config)
	}
}
