//! Registry providers, their autologin options, and image classification.
//!
//! [`classify`] walks an ordered table of `(predicate, ProviderKind)` pairs and returns the
//! first provider whose predicate claims the image; adding a provider is an insertion into
//! that table. `aws`, `azure`, and `gcp` hold the per-provider exchangers.

pub mod aws;
pub mod azure;
pub mod gcp;

// self
use crate::{_prelude::*, image::ImageReference};

type Predicate = fn(&str, &ImageReference) -> bool;

/// Ordered classification table; the first matching predicate wins.
const CLASSIFIERS: &[(Predicate, ProviderKind)] = &[
	(is_ecr_image as Predicate, ProviderKind::Aws),
	(is_gcr_host as Predicate, ProviderKind::Gcp),
	(is_acr_host as Predicate, ProviderKind::Azure),
];

/// Registry provider that owns an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// Self-hosted or public registry without provider-specific login.
	#[default]
	Generic,
	/// AWS Elastic Container Registry.
	Aws,
	/// Google Container Registry / Artifact Registry.
	Gcp,
	/// Azure Container Registry.
	Azure,
}
impl ProviderKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderKind::Generic => "generic",
			ProviderKind::Aws => "aws",
			ProviderKind::Gcp => "gcp",
			ProviderKind::Azure => "azure",
		}
	}

	/// Returns the command-line flag that enables autologin for the provider, if any.
	pub const fn autologin_flag(self) -> Option<&'static str> {
		match self {
			ProviderKind::Generic => None,
			ProviderKind::Aws => Some("--aws-autologin-for-ecr"),
			ProviderKind::Gcp => Some("--gcp-autologin-for-gcr"),
			ProviderKind::Azure => Some("--azure-autologin-for-acr"),
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-provider autologin switches supplied by the caller's configuration layer.
///
/// Everything is disabled by default; the broker never attempts a provider exchange unless
/// the matching flag is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
	/// Allow ECR logins.
	pub aws_auto_login: bool,
	/// Allow GCR / Artifact Registry logins.
	pub gcp_auto_login: bool,
	/// Allow ACR logins.
	pub azure_auto_login: bool,
}
impl ProviderOptions {
	/// Enables every provider.
	pub const fn all() -> Self {
		Self { aws_auto_login: true, gcp_auto_login: true, azure_auto_login: true }
	}

	/// Returns whether autologin is enabled for `provider`; always `false` for
	/// [`ProviderKind::Generic`].
	pub const fn enabled(&self, provider: ProviderKind) -> bool {
		match provider {
			ProviderKind::Generic => false,
			ProviderKind::Aws => self.aws_auto_login,
			ProviderKind::Gcp => self.gcp_auto_login,
			ProviderKind::Azure => self.azure_auto_login,
		}
	}
}

/// Determines which provider owns `image`.
///
/// `image` is the raw string (used for ECR account/region extraction) and `reference` its
/// parsed form (used for host suffix checks). Hosts that match nothing are
/// [`ProviderKind::Generic`], which is an expected outcome rather than an error.
pub fn classify(image: &str, reference: &ImageReference) -> ProviderKind {
	CLASSIFIERS
		.iter()
		.find(|(predicate, _)| predicate(image, reference))
		.map_or(ProviderKind::Generic, |(_, kind)| *kind)
}

fn is_ecr_image(image: &str, _: &ImageReference) -> bool {
	aws::parse_image(image).is_some()
}

fn is_gcr_host(_: &str, reference: &ImageReference) -> bool {
	gcp::valid_host(reference.registry())
}

fn is_acr_host(_: &str, reference: &ImageReference) -> bool {
	azure::valid_host(reference.registry())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify_raw(image: &str) -> ProviderKind {
		let reference = image.parse().expect("Image reference should parse.");

		classify(image, &reference)
	}

	#[test]
	fn classification_follows_host_patterns() {
		assert_eq!(
			classify_raw("123456789012.dkr.ecr.us-east-1.amazonaws.com/foo"),
			ProviderKind::Aws
		);
		assert_eq!(
			classify_raw("123456789012.dkr.ecr.cn-north-1.amazonaws.com.cn/foo:v1"),
			ProviderKind::Aws
		);
		assert_eq!(classify_raw("gcr.io/project/app"), ProviderKind::Gcp);
		assert_eq!(classify_raw("eu.gcr.io/project/app"), ProviderKind::Gcp);
		assert_eq!(
			classify_raw("europe-west1-docker.pkg.dev/project/repo/app"),
			ProviderKind::Gcp
		);
		assert_eq!(classify_raw("foo.azurecr.io/bar"), ProviderKind::Azure);
		assert_eq!(classify_raw("foo.azurecr.us/bar:v2"), ProviderKind::Azure);
		assert_eq!(classify_raw("docker.io/library/busybox"), ProviderKind::Generic);
		assert_eq!(classify_raw("ghcr.io/org/app"), ProviderKind::Generic);
	}

	#[test]
	fn options_gate_each_provider_independently() {
		let options = ProviderOptions { gcp_auto_login: true, ..Default::default() };

		assert!(!options.enabled(ProviderKind::Aws));
		assert!(options.enabled(ProviderKind::Gcp));
		assert!(!options.enabled(ProviderKind::Azure));
		assert!(!ProviderOptions::all().enabled(ProviderKind::Generic));
	}

	#[test]
	fn options_deserialize_with_missing_fields() {
		let options: ProviderOptions = serde_json::from_str(r#"{"azure_auto_login":true}"#)
			.expect("Partial options should deserialize.");

		assert_eq!(options, ProviderOptions { azure_auto_login: true, ..Default::default() });
	}
}
