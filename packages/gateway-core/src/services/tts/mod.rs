//! Text-to-speech provider abstraction and registry (§4.4).

mod aurora;
mod coalesce;
mod flash;
mod provider;

pub use aurora::AuroraProvider;
pub use coalesce::coalesce;
pub use flash::FlashProvider;
pub use provider::{AudioStream, TtsError, TtsProvider, VoiceConfig};

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

/// Resolves a configured provider id to its adapter and applies the
/// single-retry fallback rule from §4.4: "If the selected provider raises
/// before yielding any bytes, the gateway retries once with the configured
/// default provider."
pub struct TtsRegistry {
    providers: HashMap<String, Arc<dyn TtsProvider>>,
    default_id: String,
}

impl TtsRegistry {
    pub fn new(providers: Vec<Arc<dyn TtsProvider>>, default_id: impl Into<String>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.id().to_string(), p))
            .collect();
        Self {
            providers,
            default_id: default_id.into(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn TtsProvider>> {
        self.providers.get(id)
    }

    pub fn default_provider(&self) -> Option<&Arc<dyn TtsProvider>> {
        self.providers.get(&self.default_id)
    }

    /// Streams `text` through the provider named `requested_id` (or the
    /// default if absent/unknown), retrying once against the default
    /// provider if the requested one errors before its first byte.
    pub async fn stream_with_fallback(
        &self,
        requested_id: Option<&str>,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<(Arc<dyn TtsProvider>, AudioStream), TtsError> {
        let primary = requested_id
            .and_then(|id| self.providers.get(id))
            .or_else(|| self.default_provider())
            .ok_or_else(|| TtsError::Vendor("no tts provider configured".to_string()))?
            .clone();

        match primary.stream(text, voice).await {
            Ok(mut s) => match s.next().await {
                Some(Ok(first)) => {
                    let rest = stream::once(async move { Ok(first) }).chain(s);
                    Ok((primary, Box::pin(rest)))
                }
                Some(Err(_)) | None => self.fallback(&primary, text, voice).await,
            },
            Err(_) => self.fallback(&primary, text, voice).await,
        }
    }

    async fn fallback(
        &self,
        failed: &Arc<dyn TtsProvider>,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<(Arc<dyn TtsProvider>, AudioStream), TtsError> {
        let default = self
            .default_provider()
            .ok_or_else(|| TtsError::Vendor("no tts provider configured".to_string()))?;

        if Arc::ptr_eq(default, failed) {
            return Err(TtsError::Vendor(format!(
                "provider {} failed and is already the default",
                failed.id()
            )));
        }

        let stream = default.stream(text, voice).await?;
        Ok((default.clone(), stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct FailingProvider;

    #[async_trait::async_trait]
    impl TtsProvider for FailingProvider {
        fn id(&self) -> &str {
            "failing"
        }
        fn sample_rate(&self) -> u32 {
            16000
        }
        async fn stream(&self, _text: &str, _voice: &VoiceConfig) -> Result<AudioStream, TtsError> {
            Err(TtsError::Vendor("connect refused".to_string()))
        }
    }

    struct WorkingProvider;

    #[async_trait::async_trait]
    impl TtsProvider for WorkingProvider {
        fn id(&self) -> &str {
            "working"
        }
        fn sample_rate(&self) -> u32 {
            16000
        }
        async fn stream(&self, _text: &str, _voice: &VoiceConfig) -> Result<AudioStream, TtsError> {
            Ok(Box::pin(stream::iter(vec![Ok(Bytes::from_static(b"abc"))])))
        }
    }

    #[tokio::test]
    async fn falls_back_to_default_on_connect_failure() {
        let registry = TtsRegistry::new(
            vec![Arc::new(FailingProvider), Arc::new(WorkingProvider)],
            "working",
        );

        let (provider, mut s) = registry
            .stream_with_fallback(Some("failing"), "hi", &VoiceConfig::default())
            .await
            .unwrap();

        assert_eq!(provider.id(), "working");
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn unknown_provider_id_uses_default() {
        let registry = TtsRegistry::new(vec![Arc::new(WorkingProvider)], "working");
        let (provider, _) = registry
            .stream_with_fallback(Some("nonexistent"), "hi", &VoiceConfig::default())
            .await
            .unwrap();
        assert_eq!(provider.id(), "working");
    }
}
