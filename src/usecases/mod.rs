//! Application use cases. Orchestrate domain logic via ports.

pub mod handshake;
pub mod responder;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use handshake::{HandshakeState, NotificationHandshake, PendingItem, TickMode, TickOutcome};
pub use responder::ChatCommandResponder;
pub use scheduler::Scheduler;
