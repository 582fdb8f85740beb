//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root: the single place where the
//! notification channel, task spawner, resolver and coordinator are created and
//! wired together. Hosts supply the transport (a [`VoiceGateway`]) and either a
//! complete [`MediaResolver`] or the search/metadata collaborators for the
//! built-in one.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ChorusError, ChorusResult};
use crate::events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
use crate::media::{
    HttpStreamSource, MediaResolver, MetadataProvider, SearchProvider, SourceResolver,
};
use crate::protocol_constants::HTTP_CONNECT_TIMEOUT_SECS;
use crate::runtime::TokioSpawner;
use crate::services::PlaybackCoordinator;
use crate::voice::VoiceGateway;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Owns every active subscription and exposes the caller entry points.
    pub coordinator: Arc<PlaybackCoordinator>,
    /// Broadcast channel sender for notification events.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Event bridge for emitting events to subscribers and an optional external consumer.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Validated configuration the services were built with.
    pub config: Config,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Announces `notice` to every active session, tears them all down and
    /// cancels background work.
    ///
    /// Returns the number of sessions torn down.
    pub fn shutdown(&self, notice: &str) -> usize {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        let sessions = self.coordinator.shutdown(notice);
        log::info!("[Bootstrap] Tore down {} session(s)", sessions);

        // Stops anything still draining or supervising.
        self.cancel_token.cancel();

        log::info!("[Bootstrap] Shutdown complete");
        sessions
    }
}

/// Creates the shared HTTP client for stream fetching.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn create_http_client() -> ChorusResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ChorusError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all services around a host-supplied resolver.
///
/// Wiring order:
///
/// 1. Configuration validation
/// 2. Shared infrastructure (HTTP client, broadcast channel, cancellation token)
/// 3. Playback coordinator (depends on gateway, resolver, event bridge)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client cannot
/// be created.
pub fn bootstrap_services(
    config: &Config,
    gateway: Arc<dyn VoiceGateway>,
    resolver: Arc<dyn MediaResolver>,
) -> ChorusResult<BootstrappedServices> {
    let http_client = create_http_client()?;
    wire_services(config, gateway, resolver, http_client)
}

/// Bootstraps all services with the built-in [`SourceResolver`].
///
/// Direct audio URLs are streamed over the shared HTTP client; search and
/// metadata lookups go to the given providers.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client cannot
/// be created.
pub fn bootstrap_with_providers(
    config: &Config,
    gateway: Arc<dyn VoiceGateway>,
    search: Arc<dyn SearchProvider>,
    metadata: Arc<dyn MetadataProvider>,
) -> ChorusResult<BootstrappedServices> {
    let http_client = create_http_client()?;
    let streams = Arc::new(HttpStreamSource::new(http_client.clone()));
    let resolver = Arc::new(SourceResolver::new(search, metadata, streams));
    wire_services(config, gateway, resolver, http_client)
}

fn wire_services(
    config: &Config,
    gateway: Arc<dyn VoiceGateway>,
    resolver: Arc<dyn MediaResolver>,
    http_client: Client,
) -> ChorusResult<BootstrappedServices> {
    config.validate()?;

    // Create task spawner from current runtime
    let spawner = TokioSpawner::current();

    // Create broadcast channel for notification consumers
    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(config.event_channel_capacity);

    // Create the event bridge that maps domain events to broadcast transport
    let event_bridge = Arc::new(BroadcastEventBridge::with_sender(broadcast_tx.clone()));

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let coordinator = Arc::new(PlaybackCoordinator::new(
        gateway,
        resolver,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        spawner.clone(),
        config.clone(),
        cancel_token.child_token(),
    ));

    Ok(BootstrappedServices {
        coordinator,
        broadcast_tx,
        event_bridge,
        config: config.clone(),
        http_client,
        spawner,
        cancel_token,
    })
}
