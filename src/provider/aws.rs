//! AWS Elastic Container Registry login.
//!
//! ECR issues a region-scoped authorization token whose base64 payload is
//! `username:password`. The SDK call lives behind [`AuthorizationTokenIssuer`] so the decoding
//! and error taxonomy can be exercised without AWS.

// std
use std::{sync::LazyLock, time::Duration};
// crates.io
use aws_config::{BehaviorVersion, Region, SdkConfig, timeout::TimeoutConfig};
use aws_sdk_ecr::types::AuthorizationData;
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;
// self
use crate::{_prelude::*, auth::AuthConfig, provider::ProviderKind};

static ECR_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d+)\.dkr\.ecr\.([^/.]+)\.amazonaws\.com(?:\.cn)?/[^:@]+")
		.expect("Invalid regex")
});

/// Boxed future returned by [`AuthorizationTokenIssuer::authorization_data`].
pub type IssuerFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Vec<AuthorizationData>>> + 'a + Send>>;

/// Account and region extracted from an ECR image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcrImage {
	/// AWS account id owning the registry.
	pub account_id: String,
	/// Region hosting the registry.
	pub region: String,
}

/// Extracts the account id and region from an ECR image string.
///
/// Returns `None` for anything that is not
/// `<accountId>.dkr.ecr.<region>.amazonaws.com[.cn]/<repository>`.
pub fn parse_image(image: &str) -> Option<EcrImage> {
	let captures = ECR_IMAGE.captures(image)?;

	Some(EcrImage { account_id: captures[1].to_owned(), region: captures[2].to_owned() })
}

/// Issues ECR authorization data for one registry.
pub trait AuthorizationTokenIssuer
where
	Self: Send + Sync,
{
	/// Requests authorization data for `account_id` in `region`.
	fn authorization_data<'a>(&'a self, region: &'a str, account_id: &'a str)
	-> IssuerFuture<'a>;
}

/// Issuer backed by `aws-sdk-ecr` and the ambient `aws-config` credential chain.
///
/// The shared SDK configuration is loaded on first use; each call then builds a client scoped
/// to the image's region.
pub struct SdkTokenIssuer {
	sdk_config: OnceCell<SdkConfig>,
	operation_timeout: Option<Duration>,
}
impl SdkTokenIssuer {
	/// Creates an issuer, bounding every SDK operation by `operation_timeout` when set.
	pub fn new(operation_timeout: Option<Duration>) -> Self {
		Self { sdk_config: OnceCell::new(), operation_timeout }
	}

	async fn sdk_config(&self) -> &SdkConfig {
		self.sdk_config
			.get_or_init(|| async {
				let mut loader = aws_config::defaults(BehaviorVersion::latest());

				if let Some(timeout) = self.operation_timeout {
					let timeouts = TimeoutConfig::builder().operation_timeout(timeout).build();

					loader = loader.timeout_config(timeouts);
				}

				tracing::debug!("Loading ambient AWS configuration.");

				loader.load().await
			})
			.await
	}
}
impl Debug for SdkTokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SdkTokenIssuer")
			.field("loaded", &self.sdk_config.is_initialized())
			.field("operation_timeout", &self.operation_timeout)
			.finish()
	}
}
impl AuthorizationTokenIssuer for SdkTokenIssuer {
	fn authorization_data<'a>(
		&'a self,
		region: &'a str,
		account_id: &'a str,
	) -> IssuerFuture<'a> {
		Box::pin(async move {
			let sdk_config = self.sdk_config().await;
			let ecr_config = aws_sdk_ecr::config::Builder::from(sdk_config)
				.region(Region::new(region.to_owned()))
				.build();
			let client = aws_sdk_ecr::Client::from_conf(ecr_config);
			#[allow(deprecated)]
			let request = client.get_authorization_token().registry_ids(account_id);
			let output =
				request.send().await.map_err(|err| Error::Sdk { source: Box::new(err) })?;

			Ok(output.authorization_data.unwrap_or_default())
		})
	}
}

/// Exchanges ambient AWS identity for an ECR login.
#[derive(Clone)]
pub struct EcrExchanger {
	issuer: Arc<dyn AuthorizationTokenIssuer>,
}
impl EcrExchanger {
	/// Creates an exchanger backed by the ambient AWS SDK configuration.
	pub fn new(operation_timeout: Option<Duration>) -> Self {
		Self::with_issuer(Arc::new(SdkTokenIssuer::new(operation_timeout)))
	}

	/// Creates an exchanger backed by a caller-supplied issuer.
	pub fn with_issuer(issuer: Arc<dyn AuthorizationTokenIssuer>) -> Self {
		Self { issuer }
	}

	/// Obtains a registry login for `image`.
	///
	/// Fails with [`Error::UnconfiguredProvider`] when `auto_login` is off, without touching AWS.
	pub async fn login(&self, auto_login: bool, image: &str) -> Result<AuthConfig> {
		if !auto_login {
			return Err(Error::unconfigured(ProviderKind::Aws));
		}

		let EcrImage { account_id, region } = parse_image(image).ok_or_else(|| Error::ImageParse {
			provider: ProviderKind::Aws,
			image: image.to_owned(),
		})?;

		tracing::debug!(%account_id, %region, "Requesting ECR authorization token.");

		let data = self.issuer.authorization_data(&region, &account_id).await?;

		decode_authorization_token(&data)
	}
}
impl Debug for EcrExchanger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EcrExchanger").finish_non_exhaustive()
	}
}

/// Decodes the first authorization token into a username/password pair.
pub fn decode_authorization_token(data: &[AuthorizationData]) -> Result<AuthConfig> {
	let first = data.first().ok_or(Error::EmptyAuthorizationData)?;
	let token = first.authorization_token().ok_or(Error::MissingAuthorizationToken)?;
	let decoded = STANDARD.decode(token).map_err(|source| Error::TokenEncoding { source })?;
	let decoded = String::from_utf8_lossy(&decoded);
	let segments = decoded.split(':').collect::<Vec<_>>();

	match segments.as_slice() {
		[username, password] => Ok(AuthConfig::new(*username, *password)),
		_ => Err(Error::InvalidTokenFormat { segments: segments.len() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn data(token: Option<&str>) -> Vec<AuthorizationData> {
		let mut builder = AuthorizationData::builder();

		if let Some(token) = token {
			builder = builder.authorization_token(token);
		}

		vec![builder.build()]
	}

	#[test]
	fn parses_ecr_images() {
		assert_eq!(
			parse_image("012345678901.dkr.ecr.us-east-1.amazonaws.com/foo:v1"),
			Some(EcrImage { account_id: "012345678901".into(), region: "us-east-1".into() })
		);
		assert_eq!(
			parse_image("012345678901.dkr.ecr.cn-north-1.amazonaws.com.cn/foo"),
			Some(EcrImage { account_id: "012345678901".into(), region: "cn-north-1".into() })
		);
		assert_eq!(parse_image("012345678901.dkr.ecr.us-east-1.amazonaws.com"), None);
		assert_eq!(parse_image("gcr.io/foo/bar:baz"), None);
		assert_eq!(parse_image("docker.io/library/busybox"), None);
	}

	#[test]
	fn decodes_username_and_password() {
		let config = decode_authorization_token(&data(Some("dXNlcjpwYXNz")))
			.expect("Valid token should decode.");

		assert_eq!(config.username, "user");
		assert_eq!(config.password.expose(), "pass");
	}

	#[test]
	fn rejects_malformed_tokens() {
		// "foobar" is valid base64 without a separator.
		assert!(matches!(
			decode_authorization_token(&data(Some("Zm9vYmFy"))),
			Err(Error::InvalidTokenFormat { segments: 1 })
		));
		// "a:b:c"
		assert!(matches!(
			decode_authorization_token(&data(Some("YTpiOmM="))),
			Err(Error::InvalidTokenFormat { segments: 3 })
		));
		assert!(matches!(
			decode_authorization_token(&data(Some("not base64!"))),
			Err(Error::TokenEncoding { .. })
		));
		assert!(matches!(
			decode_authorization_token(&data(None)),
			Err(Error::MissingAuthorizationToken)
		));
		assert!(matches!(decode_authorization_token(&[]), Err(Error::EmptyAuthorizationData)));
	}

	struct FixedIssuer(Vec<AuthorizationData>);
	impl AuthorizationTokenIssuer for FixedIssuer {
		fn authorization_data<'a>(
			&'a self,
			region: &'a str,
			account_id: &'a str,
		) -> IssuerFuture<'a> {
			assert_eq!(region, "us-west-2");
			assert_eq!(account_id, "123456789012");

			Box::pin(async move { Ok::<_, Error>(self.0.clone()) })
		}
	}

	#[tokio::test]
	async fn login_respects_flag_and_image_shape() {
		let issuer = FixedIssuer(data(Some("dXNlcjpwYXNz")));
		let exchanger = EcrExchanger::with_issuer(Arc::new(issuer));
		let image = "123456789012.dkr.ecr.us-west-2.amazonaws.com/app:1.0";

		assert!(matches!(
			exchanger.login(false, image).await,
			Err(Error::UnconfiguredProvider { provider: ProviderKind::Aws })
		));
		assert!(matches!(
			exchanger.login(true, "gcr.io/foo/bar").await,
			Err(Error::ImageParse { provider: ProviderKind::Aws, .. })
		));

		let config = exchanger.login(true, image).await.expect("Login should succeed.");

		assert_eq!(config.username, "user");
	}
}
