// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::{_prelude::*, provider::ProviderKind};

/// Span wrapping one broker login.
#[derive(Clone, Debug)]
pub struct LoginSpan {
	span: Span,
}
impl LoginSpan {
	/// Creates a span tagged with the provider and call-site stage.
	pub fn new(provider: ProviderKind, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"registry_credential_broker.login",
			provider = provider.as_str(),
			stage
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_borrows_the_span() {
		let span = LoginSpan::new(ProviderKind::Gcp, "test");
		let first = span.instrument(async { 40 }).await;
		let second = span.instrument(async { 2 }).await;

		assert_eq!(first + second, 42);
	}
}
