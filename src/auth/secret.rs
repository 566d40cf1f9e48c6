//! Registry passwords and access tokens that must never reach logs.

// self
use crate::_prelude::*;

const MASK: &str = "***";

/// Password or token whose `Debug` and `Display` output is masked.
///
/// Use [`TokenSecret::expose`] only at the point the value goes on the wire.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw value.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({MASK})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(MASK)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_masks_the_value() {
		let secret = TokenSecret::from("bbbbb");

		assert_eq!(format!("{secret:?}"), "TokenSecret(***)");
		assert_eq!(secret.to_string(), "***");
		assert_eq!(secret.expose(), "bbbbb");
		assert!(TokenSecret::default().is_empty());
	}
}
