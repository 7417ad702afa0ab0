use std::future::Future;
use std::pin::Pin;

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// A chat-completion backend that turns a prompt into text.
pub trait Provider: Send + Sync {
    /// Provider identifier used in logs.
    fn name(&self) -> &str;

    fn chat<'a>(&'a self, message: &'a str, model: &'a str, temperature: f64) -> ProviderFuture<'a> {
        Box::pin(async move {
            self.chat_with_system(None, message, model, temperature)
                .await
        })
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> ProviderFuture<'a>;
}
