//! Rate limiting and retry around a [`TextGenerator`].

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::client::{GenerationOptions, TextGenerator};
use crate::error::{Error, Result};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window over completed calls.
#[derive(Debug)]
pub struct RateLimiter {
	rpm: usize,
	calls: VecDeque<Instant>,
}

impl RateLimiter {
	pub fn new(rpm: usize) -> Self {
		Self { rpm, calls: VecDeque::new() }
	}

	/// How long a call made at `now` has to wait. Zero `rpm` disables limiting.
	pub fn wait_time(&mut self, now: Instant) -> Duration {
		while self.calls.front().is_some_and(|t| now.saturating_duration_since(*t) >= WINDOW) {
			self.calls.pop_front();
		}
		if self.rpm == 0 || self.calls.len() < self.rpm {
			return Duration::ZERO;
		}
		match self.calls.front() {
			Some(oldest) => WINDOW.saturating_sub(now.saturating_duration_since(*oldest)),
			None => Duration::ZERO,
		}
	}

	pub fn record(&mut self, at: Instant) {
		self.calls.push_back(at);
	}

	pub fn in_window(&self) -> usize { self.calls.len() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { attempts: 3, delay: Duration::from_secs(5) }
	}
}

/// Wraps a generator with the per-model rate limit and bounded retry.
pub struct ResilientGenerator<G> {
	inner: G,
	limiter: Mutex<RateLimiter>,
	retry: RetryPolicy,
}

impl<G: TextGenerator> ResilientGenerator<G> {
	pub fn new(inner: G, rpm: usize, retry: RetryPolicy) -> Self {
		Self { inner, limiter: Mutex::new(RateLimiter::new(rpm)), retry }
	}

	pub fn inner(&self) -> &G { &self.inner }

	fn throttle(&self) {
		let wait = self.limiter.lock().unwrap_or_else(PoisonError::into_inner).wait_time(Instant::now());
		if !wait.is_zero() {
			info!(wait_secs = wait.as_secs_f32(), "rate limit reached, sleeping");
			std::thread::sleep(wait);
		}
	}
}

impl<G: TextGenerator> TextGenerator for ResilientGenerator<G> {
	fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
		self.throttle();
		let attempts = self.retry.attempts.max(1);
		let mut last = None;
		for attempt in 1..=attempts {
			match self.inner.generate(prompt, options) {
				Ok(text) => {
					self.limiter.lock().unwrap_or_else(PoisonError::into_inner).record(Instant::now());
					return Ok(text);
				}
				Err(err) => {
					warn!(attempt, attempts, error = %err, "generation attempt failed");
					last = Some(err);
					if attempt < attempts && !self.retry.delay.is_zero() {
						std::thread::sleep(self.retry.delay);
					}
				}
			}
		}
		let last = last.unwrap_or_else(|| Error::invalid_response("no attempt was made"));
		Err(Error::RetriesExhausted { attempts, last: Box::new(last) })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn waits_exactly_until_the_oldest_call_ages_out() {
		let t0 = Instant::now();
		let mut limiter = RateLimiter::new(2);
		assert_eq!(limiter.wait_time(t0), Duration::ZERO);
		limiter.record(t0);
		limiter.record(t0 + Duration::from_secs(10));

		assert_eq!(limiter.wait_time(t0 + Duration::from_secs(15)), Duration::from_secs(45));
		assert_eq!(limiter.wait_time(t0 + Duration::from_secs(59)), Duration::from_secs(1));
		// At 60s the first call leaves the window.
		assert_eq!(limiter.wait_time(t0 + Duration::from_secs(60)), Duration::ZERO);
		assert_eq!(limiter.in_window(), 1);
	}

	#[test]
	fn zero_rpm_never_waits() {
		let t0 = Instant::now();
		let mut limiter = RateLimiter::new(0);
		for _ in 0..10 { limiter.record(t0); }
		assert_eq!(limiter.wait_time(t0), Duration::ZERO);
	}
}
