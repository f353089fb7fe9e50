//! The interception entry point.
//!
//! [`AccessArbiter::decide`] runs on the thread performing the filesystem
//! operation. The pipeline is an ordered list of guards; the first one that
//! produces a verdict wins:
//!
//! 1. object not on a managed filesystem → allow
//! 2. object kind never governed → allow
//! 3. `IN_ROOT` flag clear → allow (no lock taken)
//! 4. placeholder touched by a crawler → deny
//! 5. no root found despite the flag → allow, logged as an anomaly
//! 6. root offline → offline policy
//! 7. caller is the root's provider → allow
//! 8. placeholder and content-requiring action → hydrate and wait

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};
use vroot_config::{ArbiterConfig, TransportFailurePolicy};

use crate::action::ActionMask;
use crate::classifier::ProcessClassifier;
use crate::error::IntegrityViolation;
use crate::message::{relative_path, MessageType, RequestMessage, ResponseOutcome};
use crate::metrics::{create_metrics, SharedMetrics};
use crate::node::{CallerContext, FsNode};
use crate::pending::{PendingRequestTable, RegisterError, WaitOutcome};
use crate::policy::{classify_kind, hydration_kind, offline_verdict, KindDisposition};
use crate::shutdown::{CallbackCounter, ShutdownCoordinator};
use crate::traits::{AttributeOracle, ProviderChannel, RootRegistry, VirtualizationRoot};
use crate::verdict::{DenyReason, Verdict};

/// One interception call as delivered by the host.
pub struct AccessRequest<'a> {
    pub context: &'a dyn CallerContext,
    pub target: &'a dyn FsNode,
    /// Parent of `target`; carried for hosts that supply it, unused by policy.
    pub parent: Option<&'a dyn FsNode>,
    pub action: ActionMask,
}

impl<'a> AccessRequest<'a> {
    pub fn new(context: &'a dyn CallerContext, target: &'a dyn FsNode, action: ActionMask) -> Self {
        AccessRequest {
            context,
            target,
            parent: None,
            action,
        }
    }

    pub fn with_parent(mut self, parent: &'a dyn FsNode) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Decides whether filesystem accesses inside virtualization roots proceed.
pub struct AccessArbiter {
    registry: Arc<dyn RootRegistry>,
    oracle: Arc<dyn AttributeOracle>,
    channel: Arc<dyn ProviderChannel>,
    classifier: ProcessClassifier,
    pending: Arc<PendingRequestTable>,
    callbacks: Arc<CallbackCounter>,
    on_provider_unreachable: TransportFailurePolicy,
    drain_initial_wait: Duration,
    drain_poll_interval: Duration,
    metrics: SharedMetrics,
}

impl AccessArbiter {
    pub fn new(
        config: &ArbiterConfig,
        registry: Arc<dyn RootRegistry>,
        oracle: Arc<dyn AttributeOracle>,
        channel: Arc<dyn ProviderChannel>,
    ) -> Self {
        AccessArbiter {
            registry,
            oracle,
            channel,
            classifier: ProcessClassifier::from_config(config),
            pending: Arc::new(PendingRequestTable::new(
                config.request_poll_interval.as_duration(),
            )),
            callbacks: Arc::new(CallbackCounter::new()),
            on_provider_unreachable: config.on_provider_unreachable,
            drain_initial_wait: config.drain_initial_wait.as_duration(),
            drain_poll_interval: config.drain_poll_interval.as_duration(),
            metrics: create_metrics(),
        }
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn pending(&self) -> &Arc<PendingRequestTable> {
        &self.pending
    }

    /// Interception calls currently executing.
    pub fn active_callbacks(&self) -> usize {
        self.callbacks.active()
    }

    pub fn classifier(&self) -> &ProcessClassifier {
        &self.classifier
    }

    /// A coordinator that tears down this arbiter's in-flight calls.
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(
            Arc::clone(&self.pending),
            Arc::clone(&self.callbacks),
            self.drain_initial_wait,
            self.drain_poll_interval,
        )
    }

    /// Decide one interception call.
    ///
    /// An `Err` means the object's flags could not be read; the host must
    /// fail the operation rather than pick a verdict.
    pub fn decide(&self, request: &AccessRequest<'_>) -> Result<Verdict, IntegrityViolation> {
        let _call = self.callbacks.enter();

        match self.evaluate(request) {
            Ok(verdict) => {
                self.metrics.record_verdict(verdict);
                Ok(verdict)
            }
            Err(violation) => {
                self.metrics.record_integrity_violation();
                error!(error = %violation, "access flags unreadable");
                Err(violation)
            }
        }
    }

    fn evaluate(&self, request: &AccessRequest<'_>) -> Result<Verdict, IntegrityViolation> {
        let target = request.target;
        let action = request.action;

        if !self.registry.is_on_managed_filesystem(target) {
            return Ok(Verdict::Allow);
        }

        let kind = target.kind();
        match classify_kind(kind) {
            KindDisposition::Ignore => return Ok(Verdict::Allow),
            KindDisposition::GovernUnusual => {
                info!(
                    kind = kind.label(),
                    path = %display_path(target),
                    "unusual node kind encountered"
                );
            }
            KindDisposition::Govern => {}
        }

        let pid = request.context.pid();
        let flags = self.oracle.read_flags(target).map_err(|source| IntegrityViolation {
            path: display_path(target),
            source,
        })?;
        if !flags.is_in_root() {
            self.metrics.record_fast_path();
            trace!(pid, "outside every virtualization root");
            return Ok(Verdict::Allow);
        }

        let process_name = request.context.process_name();

        if flags.is_empty_placeholder() && self.classifier.is_crawler(&process_name) {
            // An allowed crawler access would be cached by the host and the
            // placeholder would never be hydrated.
            debug!(pid, process = %process_name, action = action.bits(), "crawler denied on placeholder");
            return Ok(Verdict::Deny(DenyReason::Crawler));
        }

        let Some(root) = self.registry.find_root_containing(target) else {
            warn!(
                path = %display_path(target),
                "no virtualization root found for node flagged as inside one"
            );
            return Ok(Verdict::Allow);
        };

        if !root.is_online() {
            let verdict = offline_verdict(flags, kind, action);
            if let Verdict::Deny(reason) = verdict {
                info!(
                    pid,
                    process = %process_name,
                    action = action.bits(),
                    kind = kind.label(),
                    root = %root.path,
                    %reason,
                    "access denied with offline provider"
                );
            }
            return Ok(verdict);
        }

        // The provider's own I/O must never wait on itself.
        if root.is_provider(pid) {
            return Ok(Verdict::Allow);
        }

        if !flags.is_empty_placeholder() {
            return Ok(Verdict::Allow);
        }
        match hydration_kind(kind, action) {
            Some(message_kind) => Ok(self.send_and_await(&root, message_kind, target, pid, &process_name)),
            None => Ok(Verdict::Allow),
        }
    }

    /// Ask `root`'s provider to hydrate `target` and block until it answers
    /// or shutdown begins.
    pub fn send_and_await(
        &self,
        root: &VirtualizationRoot,
        kind: MessageType,
        target: &dyn FsNode,
        pid: i32,
        process_name: &str,
    ) -> Verdict {
        debug_assert!(kind.is_hydration(), "{:?} does not block on a response", kind);
        let path = match target.path() {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "unable to resolve node to its path");
                return Verdict::Deny(DenyReason::PathUnresolved);
            }
        };
        let relative = match relative_path(&path, &root.path) {
            Ok(relative) => relative.to_string(),
            Err(e) => {
                error!(error = %e, "node path is not under its root");
                return Verdict::Deny(DenyReason::PathUnresolved);
            }
        };

        let message = RequestMessage {
            id: self.pending.next_request_id(),
            kind,
            pid,
            process_name: process_name.to_string(),
            relative_path: relative,
        };

        let pending = match self.pending.register(message.clone()) {
            Ok(pending) => pending,
            Err(RegisterError::ShuttingDown(id)) => {
                debug!(request_id = id, "hydration refused during shutdown");
                return Verdict::Deny(DenyReason::ShuttingDown);
            }
            Err(e @ RegisterError::DuplicateId(_)) => {
                error!(error = %e, "request id collision");
                return Verdict::Deny(DenyReason::HydrationFailed);
            }
        };

        self.metrics.record_hydration_request();
        debug!(
            request_id = message.id,
            kind = ?kind,
            path = %message.relative_path,
            pid,
            process = %process_name,
            "sending hydration request"
        );

        let started = Instant::now();
        if let Err(e) = self.channel.send(root.index, &message) {
            self.metrics.record_transport_failure();
            warn!(request_id = message.id, root = root.index, error = %e, "failed to send hydration request");
            return match self.on_provider_unreachable {
                TransportFailurePolicy::Allow => Verdict::Allow,
                TransportFailurePolicy::Deny => Verdict::Deny(DenyReason::ProviderUnreachable),
            };
        }

        let verdict = match pending.wait() {
            WaitOutcome::ShutDown => Verdict::Deny(DenyReason::ShuttingDown),
            WaitOutcome::Responded(ResponseOutcome::Success) => Verdict::Allow,
            WaitOutcome::Responded(ResponseOutcome::Failure) => {
                Verdict::Deny(DenyReason::HydrationFailed)
            }
        };
        self.metrics.record_hydration_latency(started.elapsed());
        debug!(request_id = message.id, ?verdict, "hydration request resolved");
        verdict
    }

    /// Route a provider's answer to the waiting request.
    pub fn deliver_response(&self, request_id: u64, response: MessageType) -> bool {
        self.pending.deliver_response(request_id, response)
    }
}

fn display_path(node: &dyn FsNode) -> String {
    node.path().unwrap_or_else(|e| format!("<{}>", e))
}
