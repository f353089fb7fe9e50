mod action;
mod arbiter;
mod classifier;
mod error;
mod message;
mod metrics;
mod node;
mod pending;
pub mod policy;
mod service;
mod shutdown;
mod traits;
mod verdict;

pub use action::ActionMask;
pub use arbiter::{AccessArbiter, AccessRequest};
pub use classifier::ProcessClassifier;
pub use error::{
    AttributeError, ChannelError, IntegrityViolation, PathError, RegistryError, ServiceError,
};
pub use message::{relative_path, MessageType, RequestMessage, ResponseOutcome};
pub use metrics::{create_metrics, ArbiterMetrics, MetricsSnapshot, SharedMetrics};
pub use node::{AccessFlags, CallerContext, FsNode, NodeKind};
pub use pending::{PendingRequest, PendingRequestTable, RegisterError, WaitOutcome};
pub use service::{
    install, installed, uninstall, Collaborators, InterceptionHost, VirtualizationService,
};
pub use shutdown::{CallbackCounter, CallbackGuard, DrainReport, ShutdownCoordinator};
pub use traits::{
    AttributeOracle, ProviderChannel, ProviderConnection, RootRegistry, VirtualizationRoot,
};
pub use verdict::{DenyReason, ErrorCode, Verdict};
