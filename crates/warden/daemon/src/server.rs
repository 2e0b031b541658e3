//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use warden_authority::{CredentialAuthority, TokenSigner};
use warden_ledger::{AuditEvent, AuditEventType, AuditLedger, AuditResourceType};
use warden_orchestrator::AgentOrchestrator;
use warden_sandbox::{
    HealthProbe, HttpHealthProbe, InMemorySandboxRuntime, InMemorySecretStore, SandboxRuntime,
    SecretStore,
};
use warden_types::RequestId;

const ACTOR: &str = "warden-daemon";

/// Warden daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Wire the service graph with explicit collaborators.
    ///
    /// Production deployments inject their real sandbox runtime and secret
    /// store here; the daemon itself never implements them.
    pub async fn bootstrap(
        config: DaemonConfig,
        secrets: Arc<dyn SecretStore>,
        runtime: Arc<dyn SandboxRuntime>,
        probe: Arc<dyn HealthProbe>,
    ) -> DaemonResult<Self> {
        let ledger_key = secrets.ledger_key().await?;
        let ledger = Arc::new(AuditLedger::new(ledger_key));

        let signing = secrets.signing_key().await?;
        let signer = TokenSigner::new(signing.key_id, signing.seed);
        let authority = Arc::new(CredentialAuthority::new(signer, ledger.clone()));

        let orchestrator = Arc::new(AgentOrchestrator::new(
            authority.clone(),
            ledger.clone(),
            runtime,
            probe,
            config.monitor.to_orchestrator_config(),
        ));

        let state = AppState::new(authority, orchestrator, ledger);
        Ok(Self { config, state })
    }

    /// Development wiring: in-memory secret store and sandbox runtime.
    pub async fn development(config: DaemonConfig) -> DaemonResult<Self> {
        let probe_timeout = Duration::from_secs(config.monitor.probe_timeout_secs);
        Self::bootstrap(
            config,
            Arc::new(InMemorySecretStore::new()),
            Arc::new(InMemorySandboxRuntime::new()),
            Arc::new(HttpHealthProbe::new(probe_timeout)),
        )
        .await
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        self.state.ledger.append(
            AuditEvent::new(
                RequestId::generate(),
                AuditEventType::SystemStarted,
                AuditResourceType::System,
                "warden-daemon",
                ACTOR,
            )
            .detail("listen_addr", addr.to_string()),
        )?;

        let app = create_router(self.state.clone(), self.config.server.enable_cors);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Warden daemon listening on {}", addr);

        // Background expiry sweep: auto-revokes expired tokens, including
        // those orphaned by failed spawns.
        let sweep_authority = self.state.authority.clone();
        let sweep_interval = Duration::from_secs(self.config.monitor.sweep_interval_secs);
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match sweep_authority.sweep_expired(RequestId::generate()) {
                    Ok(swept) if !swept.is_empty() => {
                        tracing::info!(count = swept.len(), "Expiry sweep revoked tokens");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Expiry sweep failed"),
                }
            }
        });

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();
        served.map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Warden daemon shutting down");

        // Tear down in dependency order: stop supervision first, then
        // invalidate every outstanding credential.
        self.state.orchestrator.shutdown().await;
        if let Err(e) = self
            .state
            .authority
            .revoke_all("shutdown", RequestId::generate())
        {
            tracing::warn!(error = %e, "Failed to revoke outstanding tokens at shutdown");
        }

        self.state.ledger.append(AuditEvent::new(
            RequestId::generate(),
            AuditEventType::SystemStopped,
            AuditResourceType::System,
            "warden-daemon",
            ACTOR,
        ))?;

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
