//! Ordered fallback over several credential sources.

// self
use crate::{
	_prelude::*,
	credential::{CredentialError, CredentialFuture, TokenCredential},
};

/// Tries each source in order and returns the first token produced.
///
/// When every source fails, the individual failures are folded into
/// [`CredentialError::Exhausted`] in chain order.
#[derive(Clone, Default)]
pub struct ChainedCredential {
	kind: &'static str,
	sources: Vec<Arc<dyn TokenCredential>>,
}
impl ChainedCredential {
	/// Creates a chain labeled `kind` over `sources`.
	pub fn new(kind: &'static str, sources: Vec<Arc<dyn TokenCredential>>) -> Self {
		Self { kind, sources }
	}

	/// Number of sources in the chain.
	pub fn len(&self) -> usize {
		self.sources.len()
	}

	/// Returns `true` when the chain holds no sources.
	pub fn is_empty(&self) -> bool {
		self.sources.is_empty()
	}

	/// Labels of the chained sources, in order.
	pub fn source_kinds(&self) -> Vec<&'static str> {
		self.sources.iter().map(|source| source.kind()).collect()
	}
}
impl Debug for ChainedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ChainedCredential")
			.field("kind", &self.kind)
			.field("sources", &self.source_kinds())
			.finish()
	}
}
impl TokenCredential for ChainedCredential {
	fn kind(&self) -> &'static str {
		self.kind
	}

	fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> CredentialFuture<'a> {
		Box::pin(async move {
			let mut attempts = Vec::with_capacity(self.sources.len());

			for source in &self.sources {
				match source.get_token(scopes).await {
					Ok(token) => {
						tracing::debug!(
							chain = self.kind,
							source = source.kind(),
							"Credential source produced a token."
						);

						return Ok(token);
					},
					Err(err) => {
						tracing::debug!(
							chain = self.kind,
							source = source.kind(),
							error = %err,
							"Credential source failed."
						);

						attempts.push(err.to_string());
					},
				}
			}

			Err(CredentialError::Exhausted { attempts })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::credential::StaticCredential;

	#[tokio::test]
	async fn first_successful_source_wins() {
		let chain = ChainedCredential::new(
			"test",
			vec![
				Arc::new(StaticCredential::failing("env missing")),
				Arc::new(StaticCredential::new("second")),
				Arc::new(StaticCredential::new("third")),
			],
		);
		let token = chain.get_token(&["scope"]).await.expect("Chain should yield a token.");

		assert_eq!(token.token.expose(), "second");
	}

	#[tokio::test]
	async fn exhausted_chain_reports_every_attempt() {
		let chain = ChainedCredential::new(
			"test",
			vec![
				Arc::new(StaticCredential::failing("first down")),
				Arc::new(StaticCredential::failing("second down")),
			],
		);
		let err = chain.get_token(&["scope"]).await.expect_err("Chain should fail.");

		match err {
			CredentialError::Exhausted { attempts } => {
				assert_eq!(attempts.len(), 2);
				assert!(attempts[0].contains("first down"));
				assert!(attempts[1].contains("second down"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[tokio::test]
	async fn empty_chain_fails() {
		let chain = ChainedCredential::default();

		assert!(chain.is_empty());
		assert!(matches!(
			chain.get_token(&["scope"]).await,
			Err(CredentialError::Exhausted { attempts }) if attempts.is_empty()
		));
	}
}
