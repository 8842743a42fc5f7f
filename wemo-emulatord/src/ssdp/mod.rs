pub mod message;
pub mod responder;

pub use responder::{DiscoveryResponder, DiscoverySettings};
