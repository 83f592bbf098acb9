//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, NotifierConfig, StoreBackend, StoreConfig, TokenConfig};
use crate::error::{DaemonError, DaemonResult};
use hlofe_engine::{
    BroadcastNotifier, DisabledNotifier, LifecycleController, Notifier, PandaproxyNotifier,
};
use hlofe_gateway::{
    DomainResolver, EntityGateway, FixedDomain, InMemoryEntityStore, NgsiLdClient, NoToken,
    ShimTokenProvider, StaticToken, StoreDomainResolver, TokenProvider,
};
use hlofe_types::EntityId;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// HLO-FE Daemon Server
pub struct Server {
    config: DaemonConfig,
    controller: Arc<LifecycleController>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let gateway = build_gateway(&config.store)?;
        let domains = build_domain_resolver(&config.store, gateway.clone());
        let notifier = build_notifier(&config.notifier)?;

        info!(
            backend = ?config.store.backend,
            store = %config.store.base_url,
            notifier = notifier.name(),
            "Lifecycle controller configured"
        );

        let controller = Arc::new(LifecycleController::new(gateway, domains, notifier));
        Ok(Self { config, controller })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.controller.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;
        info!("HLO-FE daemon listening on {}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        info!("HLO-FE daemon shutting down");
        Ok(())
    }
}

fn build_token_provider(config: &TokenConfig) -> DaemonResult<Arc<dyn TokenProvider>> {
    let provider: Arc<dyn TokenProvider> = match config {
        TokenConfig::None => Arc::new(NoToken),
        TokenConfig::Static { token } => Arc::new(StaticToken::new(token.clone())),
        TokenConfig::Shim { url, timeout_secs } => Arc::new(ShimTokenProvider::new(
            url,
            Duration::from_secs(*timeout_secs),
        )?),
    };
    Ok(provider)
}

/// Entity store selected by configuration
pub fn build_gateway(config: &StoreConfig) -> DaemonResult<Arc<dyn EntityGateway>> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory entity store, state is lost on restart");
            Ok(Arc::new(InMemoryEntityStore::new()))
        }
        StoreBackend::NgsiLd => {
            let tokens = build_token_provider(&config.token)?;
            let client = NgsiLdClient::new(config.client_settings(), tokens)?;
            Ok(Arc::new(client))
        }
    }
}

/// Configured domain, else the one registered locally on the broker
pub fn build_domain_resolver(
    config: &StoreConfig,
    gateway: Arc<dyn EntityGateway>,
) -> Arc<dyn DomainResolver> {
    match config.local_domain.as_deref().map(str::trim) {
        Some(domain) if !domain.is_empty() => {
            Arc::new(FixedDomain(Some(EntityId::new(domain))))
        }
        _ => Arc::new(StoreDomainResolver::new(gateway)),
    }
}

/// Notification channel selected by configuration
pub fn build_notifier(config: &NotifierConfig) -> DaemonResult<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifierConfig::Disabled => Arc::new(DisabledNotifier),
        NotifierConfig::Broadcast { capacity } => Arc::new(BroadcastNotifier::new(*capacity)),
        NotifierConfig::Pandaproxy {
            url,
            topic,
            timeout_secs,
        } => Arc::new(PandaproxyNotifier::new(
            url,
            topic.clone(),
            Duration::from_secs(*timeout_secs),
        )?),
    };
    Ok(notifier)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
