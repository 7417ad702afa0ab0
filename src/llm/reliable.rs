use super::traits::{Provider, ProviderFuture};
use std::time::Duration;

const MAX_BACKOFF_MS: u64 = 10_000;

/// Client errors other than 408/429 will fail the same way on every attempt.
fn is_non_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .and_then(reqwest::Error::status)
    {
        let code = status.as_u16();
        return status.is_client_error() && code != 429 && code != 408;
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("api key not set") || lower.contains("insufficient_quota") {
        return true;
    }
    msg.split(|c: char| !c.is_ascii_digit())
        .filter_map(|word| word.parse::<u16>().ok())
        .find(|code| (400..500).contains(code))
        .is_some_and(|code| code != 429 && code != 408)
}

/// Retries a single provider with exponential backoff.
pub struct ReliableProvider {
    inner: Box<dyn Provider>,
    max_retries: u32,
    base_backoff_ms: u64,
}

impl ReliableProvider {
    pub fn new(inner: Box<dyn Provider>, max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff_ms: base_backoff_ms.max(50),
        }
    }
}

impl Provider for ReliableProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> ProviderFuture<'a> {
        Box::pin(async move {
            let mut backoff_ms = self.base_backoff_ms;
            let mut attempt = 0;
            loop {
                match self
                    .inner
                    .chat_with_system(system_prompt, message, model, temperature)
                    .await
                {
                    Ok(text) => {
                        if attempt > 0 {
                            tracing::info!(
                                provider = self.name(),
                                attempt,
                                "provider recovered after retries"
                            );
                        }
                        return Ok(text);
                    }
                    Err(e) if is_non_retryable(&e) || attempt >= self.max_retries => {
                        return Err(e.context(format!(
                            "{} failed after {} attempt(s)",
                            self.name(),
                            attempt + 1
                        )));
                    }
                    Err(e) => {
                        attempt += 1;
                        tracing::warn!(
                            provider = self.name(),
                            attempt,
                            max_retries = self.max_retries,
                            "provider call failed, retrying: {e}"
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
        error: &'static str,
    }

    impl Provider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn chat_with_system<'a>(
            &'a self,
            _system_prompt: Option<&'a str>,
            _message: &'a str,
            _model: &'a str,
            _temperature: f64,
        ) -> ProviderFuture<'a> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.fail_times {
                    anyhow::bail!("{}", self.error);
                }
                Ok("ok".into())
            })
        }
    }

    fn flaky(fail_times: usize, error: &'static str) -> (ReliableProvider, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ReliableProvider::new(
            Box::new(Flaky {
                calls: Arc::clone(&calls),
                fail_times,
                error,
            }),
            3,
            1,
        );
        (provider, calls)
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let (provider, calls) = flaky(2, "openai API error (500 Internal Server Error)");
        assert_eq!(provider.chat("hi", "m", 0.7).await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (provider, calls) = flaky(10, "connection reset");
        let err = provider.chat("hi", "m", 0.7).await.unwrap_err();
        assert!(err.to_string().contains("after 4 attempt(s)"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (provider, calls) = flaky(10, "openai API error (401 Unauthorized): bad key");
        assert!(provider.chat("hi", "m", 0.7).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let (provider, calls) = flaky(1, "openai API error (429 Too Many Requests)");
        assert!(provider.chat("hi", "m", 0.7).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn classifies_errors() {
        assert!(is_non_retryable(&anyhow::anyhow!("400 Bad Request")));
        assert!(!is_non_retryable(&anyhow::anyhow!("503 Service Unavailable")));
        assert!(!is_non_retryable(&anyhow::anyhow!("timed out")));
        assert!(is_non_retryable(&anyhow::anyhow!("openai API key not set")));
    }
}
