//! Timeout and retry wrapper around a [`GenerationClient`].
//!
//! A hung generation call is bounded by `request_timeout_seconds`; transient failures
//! are retried up to `max_retries` times with a fixed delay. Permanent failures
//! (invalid requests) return immediately.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{GenerationClient, GenerationError, GenerationRequest, GenerationResponse};
use crate::config::GenerationConfig;

pub struct RetryingGenerationClient {
    inner: Arc<dyn GenerationClient>,
    config: GenerationConfig,
}

impl RetryingGenerationClient {
    pub fn new(inner: Arc<dyn GenerationClient>, config: GenerationConfig) -> Self {
        Self { inner, config }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let seconds = self.config.request_timeout_seconds;
        match tokio::time::timeout(Duration::from_secs(seconds), self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout { seconds }),
        }
    }
}

#[async_trait]
impl GenerationClient for RetryingGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempt, model = %request.model.name, "Generation succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(error) if error.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %error,
                        "Generation attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ModelConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: AtomicU32,
        failures: u32,
        error: GenerationError,
    }

    #[async_trait]
    impl GenerationClient for FlakyClient {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(GenerationResponse::new("ok"))
            }
        }
    }

    struct HangingClient;

    #[async_trait]
    impl GenerationClient for HangingClient {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GenerationResponse::new("never"))
        }
    }

    fn fast_config(max_retries: u32) -> GenerationConfig {
        GenerationConfig {
            request_timeout_seconds: 1,
            max_retries,
            retry_delay_ms: 1,
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::text("prompt", ModelConfig::default())
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            failures: 2,
            error: GenerationError::Service("503".into()),
        });
        let client = RetryingGenerationClient::new(inner.clone(), fast_config(2));

        let response = client.generate(&request()).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            failures: 10,
            error: GenerationError::RateLimited("429".into()),
        });
        let client = RetryingGenerationClient::new(inner.clone(), fast_config(1));

        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(err, GenerationError::RateLimited("429".into()));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let inner = Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            failures: 10,
            error: GenerationError::InvalidRequest("bad".into()),
        });
        let client = RetryingGenerationClient::new(inner.clone(), fast_config(3));

        assert!(client.generate(&request()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        let client = RetryingGenerationClient::new(Arc::new(HangingClient), fast_config(0));
        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(err, GenerationError::Timeout { seconds: 1 });
    }
}
