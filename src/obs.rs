//! Observability helpers for broker logins.
//!
//! Every login runs inside a `registry_credential_broker.login` span carrying the `provider`
//! and `stage` fields. With the `metrics` feature enabled, each attempt/success/failure also
//! increments the `registry_credential_broker_login_total` counter, labeled by `provider` and
//! `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Outcome labels recorded for each login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginOutcome {
	/// Entry to [`Broker::login`](crate::broker::Broker::login).
	Attempt,
	/// A credential was produced, or none was needed.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl LoginOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginOutcome::Attempt => "attempt",
			LoginOutcome::Success => "success",
			LoginOutcome::Failure => "failure",
		}
	}
}
impl Display for LoginOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
