//! Multi-cloud container registry credential broker: classify an image to its owning registry
//! provider and trade ambient AWS, Azure, or GCP identity for a short-lived registry login.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod image;
pub mod obs;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::net::SocketAddr;
	// self
	use crate::{
		broker::Broker,
		config::Scheme,
		credential::{StaticCredential, TokenCredential},
		http::ReqwestHttpClient,
		image::ImageReference,
		provider::{
			aws::{AuthorizationTokenIssuer, EcrExchanger},
			azure::AcrExchanger,
			gcp::GcrExchanger,
		},
	};

	/// Builds a plain reqwest HTTP client for talking to `httpmock` servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.no_proxy()
			.build()
			.expect("Failed to build Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Plain-HTTP URL for `path` on a mock server listening at `address`.
	pub fn mock_url(address: &SocketAddr, path: &str) -> String {
		format!("http://{address}{path}")
	}

	/// Parses an image reference, panicking on invalid test input.
	pub fn test_reference(image: &str) -> ImageReference {
		image.parse().expect("Test image reference should parse.")
	}

	/// Wraps a fixed access token into a shareable [`TokenCredential`].
	pub fn static_credential(token: &str) -> Arc<dyn TokenCredential> {
		Arc::new(StaticCredential::new(token))
	}

	/// Constructs an [`AcrExchanger`] that talks plain HTTP to a mock registry using a static AAD
	/// token.
	pub fn build_test_acr_exchanger(token: &str) -> AcrExchanger {
		AcrExchanger::with_credential(
			test_reqwest_http_client(),
			Scheme::Http,
			static_credential(token),
		)
	}

	/// Constructs a [`Broker`] whose AWS exchanger uses `issuer` and whose Azure/GCP exchangers
	/// use static tokens.
	pub fn build_test_broker(issuer: Arc<dyn AuthorizationTokenIssuer>) -> Broker {
		let http_client = test_reqwest_http_client();

		Broker::with_exchangers(
			EcrExchanger::with_issuer(issuer),
			GcrExchanger::with_credential(static_credential("gcp-access-token")),
			AcrExchanger::with_credential(
				http_client,
				Scheme::Http,
				static_credential("aad-access-token"),
			),
		)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::OnceCell;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
