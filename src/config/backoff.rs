// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Exponential cooldown applied after consecutive transient refresh failures.
///
/// The n-th consecutive failure blocks new refresh attempts for `initial * 2^(n-1)`, capped at
/// `max`. With `jitter` enabled up to half of the delay is randomly shaved off so that many
/// dashboards recovering from the same outage do not retry in lockstep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
	/// Delay after the first transient failure; zero disables the policy.
	pub initial: Duration,
	/// Upper bound for the delay.
	pub max: Duration,
	/// Randomly shortens each delay by up to 50%.
	pub jitter: bool,
}
impl BackoffPolicy {
	/// Policy that never delays a refresh attempt.
	pub const DISABLED: Self = Self { initial: Duration::ZERO, max: Duration::ZERO, jitter: false };

	const MAX_EXPONENT: u32 = 16;

	/// Exponential policy with jitter enabled.
	pub const fn exponential(initial: Duration, max: Duration) -> Self {
		Self { initial, max, jitter: true }
	}

	/// Disables jitter, making delays deterministic.
	pub const fn without_jitter(mut self) -> Self {
		self.jitter = false;

		self
	}

	/// Returns `true` when the policy can delay attempts.
	pub fn is_enabled(&self) -> bool {
		self.initial.is_positive()
	}

	/// Deterministic delay for the given number of consecutive failures.
	pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
		if !self.is_enabled() || consecutive_failures == 0 {
			return Duration::ZERO;
		}

		let exponent = (consecutive_failures - 1).min(Self::MAX_EXPONENT);

		self.initial.checked_mul(1 << exponent).map_or(self.max, |delay| delay.min(self.max))
	}

	/// Delay for the given number of consecutive failures, with jitter when enabled.
	pub fn cooldown_for(&self, consecutive_failures: u32) -> Duration {
		let delay = self.delay_for(consecutive_failures);

		if !self.jitter || delay.is_zero() {
			return delay;
		}

		let half_ms = u64::try_from(delay.whole_milliseconds() / 2).unwrap_or(0);

		if half_ms == 0 {
			return delay;
		}

		let shave = rand::rng().random_range(0..=half_ms);

		delay - Duration::milliseconds(i64::try_from(shave).unwrap_or(0))
	}
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::DISABLED
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn disabled_policy_never_delays() {
		assert_eq!(BackoffPolicy::DISABLED.delay_for(5), Duration::ZERO);
		assert_eq!(BackoffPolicy::default().cooldown_for(1), Duration::ZERO);
	}

	#[test]
	fn delays_double_until_capped() {
		let policy =
			BackoffPolicy::exponential(Duration::seconds(1), Duration::seconds(10)).without_jitter();

		assert_eq!(policy.delay_for(0), Duration::ZERO);
		assert_eq!(policy.delay_for(1), Duration::seconds(1));
		assert_eq!(policy.delay_for(2), Duration::seconds(2));
		assert_eq!(policy.delay_for(4), Duration::seconds(8));
		assert_eq!(policy.delay_for(5), Duration::seconds(10));
		assert_eq!(policy.delay_for(u32::MAX), Duration::seconds(10));
		assert_eq!(policy.cooldown_for(3), Duration::seconds(4));
	}

	#[test]
	fn jitter_stays_within_half_of_the_delay() {
		let policy = BackoffPolicy::exponential(Duration::seconds(2), Duration::seconds(60));

		for _ in 0..64 {
			let delay = policy.cooldown_for(3);

			assert!(delay <= Duration::seconds(8));
			assert!(delay >= Duration::seconds(4));
		}
	}
}
