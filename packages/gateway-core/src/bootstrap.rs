//! Application bootstrap and dependency wiring.
//!
//! The composition root: the single place every service is instantiated
//! and wired together, so the binary crate only has to call
//! [`bootstrap_services`] and build an [`crate::api::AppState`] from the
//! result.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::api::AppState;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::runtime::TokioSpawner;
use crate::services::tts::{AuroraProvider, FlashProvider, TtsProvider, TtsRegistry};
use crate::services::AiDispatcher;
use crate::session::SessionManager;

/// Container for all bootstrapped services, consumed to build the
/// [`AppState`] the HTTP/WS layer runs against.
pub struct BootstrappedServices {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<AiDispatcher>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    pub spawner: TokioSpawner,
}

impl BootstrappedServices {
    pub fn into_app_state(self) -> AppState {
        AppState {
            sessions: self.sessions,
            dispatcher: self.dispatcher,
            metrics: self.metrics,
            config: self.config,
            spawner: self.spawner,
        }
    }
}

fn create_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .expect("failed to build reqwest client")
}

/// Builds the TTS provider registry from the operator's per-provider
/// configuration. Provider *kind* (SSE-framed vs. chunked-binary) is
/// selected by id convention — `"aurora"` is the SSE vendor, every other
/// configured id is treated as the chunked-binary vendor — since the
/// config shape carries only connection details, not a vendor-kind tag.
fn build_tts_registry(config: &Config, client: &Client) -> Arc<TtsRegistry> {
    let providers: Vec<Arc<dyn TtsProvider>> = config
        .tts_providers
        .iter()
        .map(|(id, provider_config)| -> Arc<dyn TtsProvider> {
            if id == "aurora" {
                Arc::new(AuroraProvider::new(
                    id.clone(),
                    client.clone(),
                    provider_config.base_url.clone(),
                    provider_config.api_key.clone(),
                    provider_config.sample_rate,
                    provider_config.default_voice_id.clone(),
                ))
            } else {
                Arc::new(FlashProvider::new(
                    id.clone(),
                    client.clone(),
                    provider_config.base_url.clone(),
                    provider_config.api_key.clone(),
                    provider_config.sample_rate,
                    provider_config.default_voice_id.clone(),
                ))
            }
        })
        .collect();

    Arc::new(TtsRegistry::new(providers, config.default_tts_provider.clone()))
}

/// Bootstraps all application services with their dependencies (§4.2-§4.4).
///
/// Wiring order: metrics → session manager → HTTP client → TTS registry →
/// AI dispatcher. The idle reaper is spawned here since it has no further
/// dependents.
pub fn bootstrap_services(config: Config) -> BootstrappedServices {
    let config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());
    let sessions = SessionManager::new(Arc::clone(&metrics));
    let spawner = TokioSpawner::current();

    sessions.spawn_idle_reaper(
        &spawner,
        config.idle_reap_scan_interval(),
        config.session_idle_timeout(),
    );

    let http_client = create_http_client();
    let tts = build_tts_registry(&config, &http_client);
    let dispatcher = Arc::new(AiDispatcher::new(
        http_client,
        Arc::clone(&config),
        tts,
        Arc::clone(&metrics),
    ));

    BootstrappedServices {
        sessions,
        dispatcher,
        metrics,
        config,
        spawner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_wires_idle_reaper_and_empty_registry() {
        let services = bootstrap_services(Config::default());
        assert_eq!(services.sessions.active_count(), 0);
    }
}
