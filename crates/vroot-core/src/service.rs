//! Start/stop ordering for the interception service.
//!
//! Start: registry init → arbiter → listener registration.
//! Stop: listener removal → abort pending requests → drain in-flight calls →
//! registry release.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};
use vroot_config::ArbiterConfig;

use crate::arbiter::AccessArbiter;
use crate::error::ServiceError;
use crate::message::MessageType;
use crate::shutdown::{DrainReport, ShutdownCoordinator};
use crate::traits::{AttributeOracle, ProviderChannel, RootRegistry};

/// The host's access-control hook mechanism.
pub trait InterceptionHost: Send + Sync {
    /// Start routing interception calls to `arbiter`.
    fn listen(&self, arbiter: Arc<AccessArbiter>) -> Result<(), ServiceError>;

    /// Stop routing new calls. Calls already dispatched may still be running
    /// when this returns.
    fn unlisten(&self);
}

/// External collaborators the arbiter consults.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn RootRegistry>,
    pub oracle: Arc<dyn AttributeOracle>,
    pub channel: Arc<dyn ProviderChannel>,
}

/// A running interception service.
pub struct VirtualizationService {
    arbiter: Arc<AccessArbiter>,
    coordinator: ShutdownCoordinator,
    registry: Arc<dyn RootRegistry>,
    host: Arc<dyn InterceptionHost>,
    running: Mutex<bool>,
}

impl VirtualizationService {
    /// Initialize the registry and start intercepting.
    ///
    /// The config is normalized before validation, as [`ArbiterConfig::load`]
    /// does. On failure every step already taken is undone.
    pub fn start(
        config: &ArbiterConfig,
        collaborators: Collaborators,
        host: Arc<dyn InterceptionHost>,
    ) -> Result<Self, ServiceError> {
        let config = &config.effective();
        config.validate_or_err()?;

        let Collaborators {
            registry,
            oracle,
            channel,
        } = collaborators;

        registry.init()?;

        let arbiter = Arc::new(AccessArbiter::new(config, Arc::clone(&registry), oracle, channel));
        let coordinator = arbiter.shutdown_coordinator();

        if let Err(e) = host.listen(Arc::clone(&arbiter)) {
            error!(error = %e, "failed to register interception listener");
            if let Err(release_err) = registry.release() {
                warn!(error = %release_err, "registry release failed while unwinding start");
            }
            return Err(e);
        }

        info!(crawlers = arbiter.classifier().len(), "interception service started");
        Ok(VirtualizationService {
            arbiter,
            coordinator,
            registry,
            host,
            running: Mutex::new(true),
        })
    }

    pub fn arbiter(&self) -> &Arc<AccessArbiter> {
        &self.arbiter
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Route a provider's answer to the waiting request.
    pub fn deliver_response(&self, request_id: u64, response: MessageType) -> bool {
        self.arbiter.deliver_response(request_id, response)
    }

    /// Tear down in the required order. Blocks until every in-flight call
    /// has returned.
    pub fn stop(&self) -> Result<DrainReport, ServiceError> {
        let mut running = self.running.lock();
        if !*running {
            return Err(ServiceError::NotRunning);
        }

        self.host.unlisten();
        info!("interception listener removed");

        let report = self.coordinator.shutdown();
        *running = false;
        drop(running);

        self.registry.release()?;
        info!(
            woken = report.woken,
            waited_ms = report.waited.as_millis() as u64,
            "interception service stopped"
        );
        Ok(report)
    }
}

impl Drop for VirtualizationService {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("interception service dropped while running, stopping");
            if let Err(e) = self.stop() {
                error!(error = %e, "failed to stop interception service");
            }
        }
    }
}

static INSTALLED: RwLock<Option<Arc<VirtualizationService>>> = RwLock::new(None);

/// Publish `service` for hosts whose hook cannot carry a state pointer.
pub fn install(service: Arc<VirtualizationService>) -> Result<(), ServiceError> {
    let mut slot = INSTALLED.write();
    if slot.is_some() {
        return Err(ServiceError::AlreadyRunning);
    }
    *slot = Some(service);
    Ok(())
}

/// The published service, if any.
pub fn installed() -> Option<Arc<VirtualizationService>> {
    INSTALLED.read().clone()
}

/// Withdraw the published service so it can be stopped.
pub fn uninstall() -> Option<Arc<VirtualizationService>> {
    INSTALLED.write().take()
}
