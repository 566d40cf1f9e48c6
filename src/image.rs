//! Structured container image references.
//!
//! [`ImageReference`] splits a raw image string into registry host, repository path, tag, and
//! digest using the same normalization registry clients apply: references without an explicit
//! registry resolve to Docker Hub (`index.docker.io`) and single-component Docker Hub
//! repositories live under `library/`.

// self
use crate::_prelude::*;

/// Registry host used when an image omits one.
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

const DOCKER_HUB_ALIAS: &str = "docker.io";
const TAG_MAX_LEN: usize = 128;

/// Error returned when an image string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ImageReferenceError {
	/// The input was empty or whitespace.
	#[error("Image reference cannot be empty.")]
	Empty,
	/// No repository path follows the registry host.
	#[error("Image reference `{image}` has no repository.")]
	MissingRepository {
		/// Raw image string.
		image: String,
	},
	/// A repository path component contains forbidden characters.
	#[error("Repository component `{component}` is invalid.")]
	InvalidRepository {
		/// Offending component.
		component: String,
	},
	/// The tag contains forbidden characters or is too long.
	#[error("Tag `{tag}` is invalid.")]
	InvalidTag {
		/// Offending tag.
		tag: String,
	},
	/// The digest is not `<algorithm>:<hex>`.
	#[error("Digest `{digest}` is invalid.")]
	InvalidDigest {
		/// Offending digest.
		digest: String,
	},
}

/// Parsed, immutable image reference.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
	registry: String,
	repository: String,
	tag: Option<String>,
	digest: Option<String>,
}
impl ImageReference {
	/// Registry host, including the port when one was given.
	pub fn registry(&self) -> &str {
		&self.registry
	}

	/// Repository path below the registry.
	pub fn repository(&self) -> &str {
		&self.repository
	}

	/// Tag, when present.
	pub fn tag(&self) -> Option<&str> {
		self.tag.as_deref()
	}

	/// Digest, when present.
	pub fn digest(&self) -> Option<&str> {
		self.digest.as_deref()
	}

	/// `registry/repository` without tag or digest.
	pub fn name(&self) -> String {
		format!("{}/{}", self.registry, self.repository)
	}

	fn parse(raw: &str) -> Result<Self, ImageReferenceError> {
		let raw = raw.trim();

		if raw.is_empty() {
			return Err(ImageReferenceError::Empty);
		}

		let (rest, digest) = match raw.split_once('@') {
			Some((rest, digest)) => {
				validate_digest(digest)?;

				(rest, Some(digest.to_owned()))
			},
			None => (raw, None),
		};
		let last_slash = rest.rfind('/').map_or(0, |idx| idx + 1);
		let (name, tag) = match rest[last_slash..].rfind(':') {
			Some(idx) => {
				let split = last_slash + idx;
				let tag = &rest[split + 1..];

				validate_tag(tag)?;

				(&rest[..split], Some(tag.to_owned()))
			},
			None => (rest, None),
		};
		let (registry, repository) = match name.split_once('/') {
			Some((first, remainder)) if is_registry_component(first) =>
				(canonical_registry(first), remainder.to_owned()),
			_ => (DEFAULT_REGISTRY.to_owned(), name.to_owned()),
		};

		if repository.is_empty() {
			return Err(ImageReferenceError::MissingRepository { image: raw.to_owned() });
		}

		for component in repository.split('/') {
			validate_component(component)?;
		}

		let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
			format!("library/{repository}")
		} else {
			repository
		};

		Ok(Self { registry, repository, tag, digest })
	}
}
impl FromStr for ImageReference {
	type Err = ImageReferenceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Display for ImageReference {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.registry, self.repository)?;

		if let Some(tag) = &self.tag {
			write!(f, ":{tag}")?;
		}
		if let Some(digest) = &self.digest {
			write!(f, "@{digest}")?;
		}

		Ok(())
	}
}
impl Debug for ImageReference {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ImageReference({self})")
	}
}

fn is_registry_component(component: &str) -> bool {
	component.contains('.') || component.contains(':') || component == "localhost"
}

fn canonical_registry(host: &str) -> String {
	if host == DOCKER_HUB_ALIAS { DEFAULT_REGISTRY.to_owned() } else { host.to_owned() }
}

fn validate_component(component: &str) -> Result<(), ImageReferenceError> {
	let valid = !component.is_empty()
		&& component.chars().all(|c| {
			c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
		}) && component.starts_with(|c: char| c.is_ascii_alphanumeric());

	if valid {
		Ok(())
	} else {
		Err(ImageReferenceError::InvalidRepository { component: component.to_owned() })
	}
}

fn validate_tag(tag: &str) -> Result<(), ImageReferenceError> {
	let valid = !tag.is_empty()
		&& tag.len() <= TAG_MAX_LEN
		&& tag.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
		&& tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

	if valid { Ok(()) } else { Err(ImageReferenceError::InvalidTag { tag: tag.to_owned() }) }
}

fn validate_digest(digest: &str) -> Result<(), ImageReferenceError> {
	let valid = digest.split_once(':').is_some_and(|(algorithm, hex)| {
		!algorithm.is_empty()
			&& algorithm
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '_' | '-'))
			&& hex.len() >= 32
			&& hex.chars().all(|c| c.is_ascii_hexdigit())
	});

	if valid {
		Ok(())
	} else {
		Err(ImageReferenceError::InvalidDigest { digest: digest.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(raw: &str) -> ImageReference {
		raw.parse().expect("Image reference should parse.")
	}

	#[test]
	fn docker_hub_shorthand_is_normalized() {
		let reference = parse("busybox");

		assert_eq!(reference.registry(), DEFAULT_REGISTRY);
		assert_eq!(reference.repository(), "library/busybox");
		assert_eq!(reference.tag(), None);

		let reference = parse("docker.io/library/busybox:1.36");

		assert_eq!(reference.registry(), DEFAULT_REGISTRY);
		assert_eq!(reference.repository(), "library/busybox");
		assert_eq!(reference.tag(), Some("1.36"));
	}

	#[test]
	fn registry_with_port_keeps_port_and_tag() {
		let reference = parse("localhost:5000/foo/bar:v1");

		assert_eq!(reference.registry(), "localhost:5000");
		assert_eq!(reference.repository(), "foo/bar");
		assert_eq!(reference.tag(), Some("v1"));
		assert_eq!(reference.to_string(), "localhost:5000/foo/bar:v1");
	}

	#[test]
	fn cloud_hosts_are_recognized_as_registries() {
		assert_eq!(
			parse("123456789012.dkr.ecr.us-east-1.amazonaws.com/foo").registry(),
			"123456789012.dkr.ecr.us-east-1.amazonaws.com"
		);
		assert_eq!(parse("foo.azurecr.io/bar").registry(), "foo.azurecr.io");
		assert_eq!(parse("gcr.io/project/app").repository(), "project/app");
	}

	#[test]
	fn digest_is_split_from_name() {
		let digest = format!("sha256:{}", "a".repeat(64));
		let reference = parse(&format!("ghcr.io/org/app:1.0@{digest}"));

		assert_eq!(reference.tag(), Some("1.0"));
		assert_eq!(reference.digest(), Some(digest.as_str()));
		assert_eq!(reference.name(), "ghcr.io/org/app");
	}

	#[test]
	fn invalid_inputs_are_rejected() {
		assert_eq!("  ".parse::<ImageReference>(), Err(ImageReferenceError::Empty));
		assert!(matches!(
			"ghcr.io/Org/app".parse::<ImageReference>(),
			Err(ImageReferenceError::InvalidRepository { .. })
		));
		assert!(matches!(
			"ghcr.io/org/app:-bad".parse::<ImageReference>(),
			Err(ImageReferenceError::InvalidTag { .. })
		));
		assert!(matches!(
			"ghcr.io/org/app@sha256:xyz".parse::<ImageReference>(),
			Err(ImageReferenceError::InvalidDigest { .. })
		));
		assert!(matches!(
			"ghcr.io/".parse::<ImageReference>(),
			Err(ImageReferenceError::MissingRepository { .. })
		));
	}
}
