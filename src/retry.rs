//! Fixed-delay retry policy for provider calls

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use log::{debug, warn};
use crate::config::RetryConfig;

/// Retry policy for failed requests.
///
/// Every failure is retried until `max_attempts` calls have been made,
/// sleeping `delay` between calls. No backoff, no jitter, and nothing is
/// shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy
{   pub max_attempts: u32
  , pub delay: Duration
}

/// Last error of a retry sequence that never succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E>
{   pub attempts: u32
  , pub last: E
}

impl RetryPolicy
{   /// Create a new retry policy. Zero attempts is treated as one.
    pub fn new(
      max_attempts: u32
    , delay: Duration
    ) -> Self
    {   RetryPolicy
        {   max_attempts: max_attempts.max(1)
          , delay
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self
    {   RetryPolicy::new(config.attempts, config.delay)
    }

    /// Run `op` until it succeeds or the attempt bound is reached.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
      &self
    , mut op: F
    ) -> Result<T, Exhausted<E>>
    where
      F: FnMut(u32) -> Fut
    , Fut: Future<Output = Result<T, E>>
    , E: Display
    {   let mut attempt = 1;
        loop
        {   match op(attempt).await
            {   Ok(value) => {
                  if attempt > 1
                  {   debug!("Succeeded on attempt {}", attempt);
                  }
                  return Ok(value);
                }
              , Err(e) if attempt < self.max_attempts => {
                  warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, self.max_attempts, e, self.delay
                  );
                  tokio::time::sleep(self.delay).await;
                  attempt += 1;
                }
              , Err(e) => {
                  warn!(
                    "Attempt {}/{} failed: {}; giving up",
                    attempt, self.max_attempts, e
                  );
                  return Err(Exhausted
                  {   attempts: attempt
                    , last: e
                  });
                }
            }
        }
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from_config(&RetryConfig::default())
    }
}
