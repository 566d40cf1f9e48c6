// self
use crate::{obs::LoginOutcome, provider::ProviderKind};

/// Records a login outcome via the global metrics recorder (when enabled).
pub fn record_login_outcome(provider: ProviderKind, outcome: LoginOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"registry_credential_broker_login_total",
			"provider" => provider.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (provider, outcome);
	}
}
