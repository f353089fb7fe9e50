//! A running service wired to in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use vroot_config::ArbiterConfig;
use vroot_core::{
    AccessArbiter, ActionMask, Collaborators, IntegrityViolation, ServiceError, Verdict,
    VirtualizationService,
};

use crate::host::{SimCaller, SimHost};
use crate::provider::SimProvider;
use crate::tree::{EventLog, MemFs, MemNode};

/// Config tuned for tests: short poll intervals and no initial drain wait.
pub fn fast_config() -> ArbiterConfig {
    ArbiterConfig::default()
        .with_request_poll_interval(Duration::from_millis(20))
        .with_drain_timing(Duration::ZERO, Duration::from_millis(1))
}

pub struct Harness {
    pub fs: Arc<MemFs>,
    pub provider: Arc<SimProvider>,
    pub host: Arc<SimHost>,
    pub service: VirtualizationService,
    pub events: EventLog,
}

impl Harness {
    /// Start a service over `fs`. Roots and flags may be added before or
    /// after.
    pub fn start(config: &ArbiterConfig, fs: MemFs) -> Result<Self, ServiceError> {
        let events = fs.events().clone();
        let fs = Arc::new(fs);
        let provider = Arc::new(SimProvider::new(Arc::clone(&fs)));
        let host = Arc::new(SimHost::new(events.clone()));
        let service = VirtualizationService::start(
            config,
            Collaborators {
                registry: fs.clone(),
                oracle: fs.clone(),
                channel: provider.clone(),
            },
            host.clone(),
        )?;
        provider.attach(service.arbiter());

        Ok(Harness {
            fs,
            provider,
            host,
            service,
            events,
        })
    }

    /// A fresh filesystem with an empty event log.
    pub fn start_empty(config: &ArbiterConfig) -> Result<Self, ServiceError> {
        Self::start(config, MemFs::with_events(EventLog::new()))
    }

    pub fn arbiter(&self) -> &Arc<AccessArbiter> {
        self.service.arbiter()
    }

    pub fn access(
        &self,
        caller: &SimCaller,
        node: &MemNode,
        action: ActionMask,
    ) -> Result<Verdict, IntegrityViolation> {
        self.host.access(caller, node, action)
    }
}
