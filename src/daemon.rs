//! Daemon - the device controller service
//!
//! Settles the device identity, starts the assistant session, registers the
//! device when needed and then runs the event dispatcher until the session
//! ends or the process is asked to stop.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::assistant::{BridgeSession, EventSource};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::identity::{
    CloudRegistrar, Credentials, DeviceRegistration, ReconciliationDecision, Registrar,
    RegistrationCall, ResolvedIdentity, resolve,
};
use crate::plugins::{PluginContext, PluginRegistry};
use crate::{Config, Result};

/// Shown when the device needs registering but no project id is known
const NOT_REGISTERED_NOTICE: &str = "this device is not registered: device actions will not \
    work and it will not show up in the assistant settings; pass --project-id to register it";

/// The Kestrel daemon
pub struct Daemon {
    config: Config,
    registry: PluginRegistry,
}

impl Daemon {
    /// Create a daemon with the built-in plugins
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: PluginRegistry::builtin(),
        }
    }

    /// Replace the plugin registry
    #[must_use]
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run until the assistant session ends or a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns error on any fatal startup failure (missing model id, bad
    /// credentials, bridge start, registration) or if the event stream fails
    pub async fn run(self) -> Result<DispatchStats> {
        let config = &self.config;

        let persisted = DeviceRegistration::load(&config.device_config)?;
        let identity = resolve(&config.registration, persisted.as_ref())?;
        let credentials = Arc::new(Credentials::load(&config.credentials)?);

        let session =
            BridgeSession::spawn(&config.bridge, identity.model_id(), config.conversation_cooldown)
                .await?;

        tracing::info!(
            model_id = identity.model_id(),
            device_id = session.device_id(),
            "assistant session started"
        );

        let registrar = CloudRegistrar::new(credentials)?;
        apply_registration(&identity, session.device_id(), &registrar, &config.device_config)
            .await?;

        let ctx = PluginContext::new(session.conversation())
            .with_settings(config.plugin_settings.clone());

        serve(session, &self.registry, &config.plugins, &ctx, shutdown_signal()).await
    }
}

/// Act on the reconciliation decision for the now-known `device_id`
///
/// On `MustRegister` the registration call runs first; the record is only
/// written once it succeeded.
///
/// # Errors
///
/// Returns error if the registration call or the record write fails
pub async fn apply_registration(
    identity: &ResolvedIdentity,
    device_id: &str,
    registrar: &dyn Registrar,
    device_config: &Path,
) -> Result<ReconciliationDecision> {
    let decision = identity.decide(device_id);

    match &decision {
        ReconciliationDecision::NoActionNeeded => {
            tracing::debug!(device_id, "device registration up to date");
        }
        ReconciliationDecision::MustRegister {
            model_id,
            project_id,
        } => {
            registrar
                .register(&RegistrationCall {
                    project_id: project_id.clone(),
                    model_id: model_id.clone(),
                    device_id: device_id.to_string(),
                    nickname: identity.nickname().map(ToString::to_string),
                })
                .await?;
            identity
                .registration_for(project_id, device_id)
                .save(device_config)?;
        }
        ReconciliationDecision::Unregistered { model_id } => {
            tracing::warn!(model_id = %model_id, device_id, "{NOT_REGISTERED_NOTICE}");
        }
    }

    Ok(decision)
}

/// Attach the named plugins and dispatch events from `source`
///
/// # Errors
///
/// Returns error if the event source fails
pub async fn serve<S, F>(
    source: S,
    registry: &PluginRegistry,
    plugin_names: &[String],
    ctx: &PluginContext,
    shutdown: F,
) -> Result<DispatchStats>
where
    S: EventSource,
    F: Future<Output = ()>,
{
    let mut dispatcher = Dispatcher::new(source);
    for plugin in registry.load_all(plugin_names, ctx) {
        dispatcher.add_plugin(plugin)?;
    }
    dispatcher.run(shutdown).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
