use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use vroot_config::TransportFailurePolicy;
use vroot_core::{ActionMask, DrainReport, NodeKind, ServiceError, VirtualizationService};

use crate::harness::{fast_config, Harness};
use crate::host::{SimCaller, SimHost};
use crate::oracle::{Expected, NodeModel, Oracle};
use crate::provider::{Behaviour, SimProvider};
use crate::tree::{EventLog, MemFs, MemNode};

pub const ROOT_PATH: &str = "/repo";
pub const ROOT_INDEX: i16 = 0;
pub const PROVIDER_PID: i32 = 500;

/// A recorded mismatch between the model and the system.
#[derive(Debug, Clone)]
pub struct Violation {
    pub step: usize,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.message)
    }
}

/// One simulated event.
#[derive(Debug, Clone)]
pub enum Op {
    Access {
        path: String,
        caller: SimCaller,
        action: ActionMask,
    },
    SetOnline(bool),
    SetBehaviour(Behaviour),
    /// The provider hydrates a node on its own initiative.
    Prefetch { path: String },
}

struct TreeEntry {
    path: &'static str,
    kind: NodeKind,
    model: NodeModel,
}

fn entry(path: &'static str, kind: NodeKind) -> TreeEntry {
    TreeEntry {
        path,
        kind,
        model: NodeModel {
            kind,
            unmanaged: false,
            in_root: true,
            orphaned: false,
            attributes_fail: false,
            resolvable: true,
        },
    }
}

fn tree() -> Vec<TreeEntry> {
    let mut entries = vec![
        entry("/repo", NodeKind::Directory),
        entry("/repo/src", NodeKind::Directory),
        entry("/repo/src/main.rs", NodeKind::Regular),
        entry("/repo/src/lib.rs", NodeKind::Regular),
        entry("/repo/docs", NodeKind::Directory),
        entry("/repo/docs/guide.md", NodeKind::Regular),
        entry("/repo/README.md", NodeKind::Regular),
        entry("/repo/current", NodeKind::Symlink),
        entry("/repo/build.fifo", NodeKind::Fifo),
        entry("/repo/resource.fork", NodeKind::Stream),
    ];

    let mut outside = entry("/home/user/notes.txt", NodeKind::Regular);
    outside.model.in_root = false;
    entries.push(outside);

    let mut unmanaged = entry("/proc/1/status", NodeKind::Regular);
    unmanaged.model.unmanaged = true;
    entries.push(unmanaged);

    let mut orphan = entry("/repo/orphan.txt", NodeKind::Regular);
    orphan.model.orphaned = true;
    entries.push(orphan);

    let mut broken = entry("/repo/broken.bin", NodeKind::Regular);
    broken.model.attributes_fail = true;
    entries.push(broken);

    let mut ghost = entry("/repo/ghost.txt", NodeKind::Regular);
    ghost.model.resolvable = false;
    entries.push(ghost);

    entries
}

fn callers() -> Vec<SimCaller> {
    vec![
        SimCaller::new(100, "cat"),
        SimCaller::new(101, "vim"),
        SimCaller::new(102, "mds"),
        SimCaller::new(103, "mdworker"),
        SimCaller::new(104, "Spotlight"),
        SimCaller::new(PROVIDER_PID, "vroot-provider"),
    ]
}

fn actions() -> Vec<ActionMask> {
    use ActionMask as A;
    vec![
        A::READ_DATA,
        A::WRITE_DATA,
        A::EXECUTE,
        A::DELETE,
        A::APPEND_DATA,
        A::DELETE_CHILD,
        A::READ_ATTRIBUTES,
        A::WRITE_ATTRIBUTES,
        A::READ_EXTATTRIBUTES,
        A::WRITE_EXTATTRIBUTES,
        A::READ_SECURITY,
        A::WRITE_SECURITY,
        A::TAKE_OWNERSHIP,
        A::SYNCHRONIZE,
        A::LINKTARGET,
        A::ACCESS,
        A::ACCESS | A::READ_DATA,
        A::ACCESS | A::WRITE_DATA,
        A::READ_DATA | A::WRITE_DATA,
        A::READ_ATTRIBUTES | A::READ_SECURITY,
        A::empty(),
    ]
}

/// The main simulation harness.
pub struct Sim {
    pub fs: Arc<MemFs>,
    pub provider: Arc<SimProvider>,
    pub host: Arc<SimHost>,
    pub service: VirtualizationService,
    pub oracle: Oracle,
    pub rng: ChaCha8Rng,
    pub step: usize,
    pub violations: Vec<Violation>,
    /// One line per executed op, for determinism checks.
    pub trace: Vec<String>,
    nodes: Vec<(String, MemNode)>,
    callers: Vec<SimCaller>,
    actions: Vec<ActionMask>,
}

impl Sim {
    /// Create a deterministic simulation with the given seed.
    pub fn new(seed: u64) -> Result<Self, ServiceError> {
        Self::with_policy(seed, TransportFailurePolicy::Allow)
    }

    pub fn with_policy(seed: u64, policy: TransportFailurePolicy) -> Result<Self, ServiceError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = MemFs::with_events(EventLog::new());
        fs.add_root(ROOT_INDEX, ROOT_PATH, Some(PROVIDER_PID));
        fs.add_unmanaged_prefix("/proc");

        let config = fast_config().with_transport_failure_policy(policy);
        let mut oracle = Oracle::new(config.crawlers.iter().cloned(), PROVIDER_PID, policy);

        let mut nodes = Vec::new();
        for TreeEntry { path, kind, model } in tree() {
            let empty = model.in_root && path != ROOT_PATH && rng.gen_bool(0.7);
            if model.in_root {
                fs.add_placeholder(path, empty);
            }
            if model.orphaned {
                fs.orphan(path);
            }
            if model.attributes_fail {
                fs.fail_attributes(path);
            }
            let mut node = MemNode::new(path, kind);
            if !model.resolvable {
                node = node.unresolvable();
            }
            oracle.add_node(path, model, empty);
            nodes.push((path.to_string(), node));
        }

        let Harness {
            fs,
            provider,
            host,
            service,
            ..
        } = Harness::start(&config, fs)?;

        Ok(Sim {
            fs,
            provider,
            host,
            service,
            oracle,
            rng,
            step: 0,
            violations: Vec::new(),
            trace: Vec::new(),
            nodes,
            callers: callers(),
            actions: actions(),
        })
    }

    /// Draw the next op.
    pub fn generate(&mut self) -> Op {
        let roll: u32 = self.rng.gen_range(0..100);
        match roll {
            0..=4 => Op::SetOnline(self.rng.gen_bool(0.5)),
            5..=9 => {
                let behaviour = *[Behaviour::Succeed, Behaviour::Fail, Behaviour::RejectSend]
                    .choose(&mut self.rng)
                    .unwrap_or(&Behaviour::Succeed);
                Op::SetBehaviour(behaviour)
            }
            10..=12 => {
                let idx = self.rng.gen_range(0..self.nodes.len());
                Op::Prefetch {
                    path: self.nodes[idx].0.clone(),
                }
            }
            _ => {
                let idx = self.rng.gen_range(0..self.nodes.len());
                let caller = self.callers[self.rng.gen_range(0..self.callers.len())].clone();
                let action = self.actions[self.rng.gen_range(0..self.actions.len())];
                Op::Access {
                    path: self.nodes[idx].0.clone(),
                    caller,
                    action,
                }
            }
        }
    }

    /// Run the simulation for the given number of steps.
    pub fn run(&mut self, steps: usize) -> &[Violation] {
        for _ in 0..steps {
            let op = self.generate();
            self.step_with(op);
        }
        &self.violations
    }

    /// Execute one op and check it against the model.
    pub fn step_with(&mut self, op: Op) {
        match &op {
            Op::SetOnline(online) => {
                let provider = online.then_some(PROVIDER_PID);
                self.fs.set_provider(ROOT_INDEX, provider);
                self.oracle.set_online(*online);
                self.trace.push(format!("online={}", online));
            }
            Op::SetBehaviour(behaviour) => {
                self.provider.set_behaviour(*behaviour);
                self.oracle.set_behaviour(*behaviour);
                self.trace.push(format!("behaviour={:?}", behaviour));
            }
            Op::Prefetch { path } => {
                self.fs.mark_hydrated(path);
                self.oracle.mark_hydrated(path);
                self.trace.push(format!("prefetch {}", path));
            }
            Op::Access {
                path,
                caller,
                action,
            } => self.access(path, caller, *action),
        }
        self.check_quiescent();
        self.step += 1;
    }

    fn access(&mut self, path: &str, caller: &SimCaller, action: ActionMask) {
        let Some((_, node)) = self.nodes.iter().find(|(p, _)| p == path) else {
            return;
        };
        let process = vroot_core::CallerContext::process_name(caller);
        let expected = self.oracle.predict(path, caller.pid, &process, action);
        let actual = self.host.access(caller, node, action);

        let matches = match (&expected, &actual) {
            (Expected::Verdict(want), Ok(got)) => want == got,
            (Expected::IntegrityViolation, Err(_)) => true,
            _ => false,
        };
        debug!(step = self.step, path, pid = caller.pid, ?expected, ?actual, "access");
        self.trace.push(format!(
            "{} {} {:#x} -> {:?}",
            caller.name,
            path,
            action.bits(),
            actual.as_ref().map_err(|e| e.to_string())
        ));

        if !matches {
            self.violations.push(Violation {
                step: self.step,
                message: format!(
                    "{} (pid {}) {:?} on {}: expected {:?}, got {:?}",
                    caller.name, caller.pid, action, path, expected, actual
                ),
            });
        }

        self.oracle.commit(path, caller.pid, &process, action, expected);
        let model_empty = self.oracle.is_empty(path);
        let real_empty = self.fs.flags(path).is_empty_placeholder();
        if model_empty != real_empty {
            self.violations.push(Violation {
                step: self.step,
                message: format!(
                    "{}: model empty={} but filesystem empty={}",
                    path, model_empty, real_empty
                ),
            });
        }
    }

    /// Between sequential steps nothing may be in flight.
    fn check_quiescent(&mut self) {
        let arbiter = self.service.arbiter();
        if !arbiter.pending().is_empty() {
            self.violations.push(Violation {
                step: self.step,
                message: format!("{} requests left pending", arbiter.pending().len()),
            });
        }
        if arbiter.active_callbacks() != 0 {
            self.violations.push(Violation {
                step: self.step,
                message: format!("{} callbacks still active", arbiter.active_callbacks()),
            });
        }
    }

    /// Stop the service and check the teardown invariants.
    pub fn finish(&mut self) -> Result<DrainReport, ServiceError> {
        let report = self.service.stop()?;
        self.provider.shutdown();
        let arbiter = self.service.arbiter();
        if !arbiter.pending().is_empty() || arbiter.active_callbacks() != 0 {
            self.violations.push(Violation {
                step: self.step,
                message: "service stopped with work in flight".to_string(),
            });
        }
        Ok(report)
    }
}
