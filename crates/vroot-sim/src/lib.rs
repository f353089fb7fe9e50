pub mod harness;
pub mod host;
pub mod oracle;
pub mod provider;
pub mod sim;
pub mod tree;

pub use harness::{fast_config, Harness};
pub use host::{SimCaller, SimHost};
pub use provider::{Behaviour, SimProvider};
pub use sim::Sim;
pub use tree::{Event, EventLog, MemFs, MemNode};
