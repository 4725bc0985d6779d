//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by the chat adapter into the application
//! - Outbound: Called by application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::CommandPort;
pub use outbound::{ChatPort, CredentialProvider, MailGateway, TokenStore, TransactionRepo};
