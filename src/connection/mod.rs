//! Broker connection: session supervision, the outbound message path, and
//! the heartbeat.

pub mod heartbeat;
pub mod outbound;
pub mod supervisor;
mod tls;

pub use outbound::{Outbound, SendError, DEFAULT_MSG_TIMEOUT};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
