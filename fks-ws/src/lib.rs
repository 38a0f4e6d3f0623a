//! fks-ws
//!
//! Real-time WebSocket fan-out: a per-connection subscription
//! registry (`registry`), the wire protocol (`protocol`), an upstream
//! multiplexer abstraction with a REST-polling default implementation
//! (`upstream`), the controller tying union recomputation to upstream
//! reconnects (`fanout`), and the axum endpoint itself (`handler`).
#![warn(missing_docs)]

pub mod fanout;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod upstream;

pub use fanout::FanoutController;
pub use handler::ws_handler;
pub use protocol::{ClientMessage, FanoutEvent, ServerMessage};
pub use registry::{ConnectionId, Subscription, SubscriptionRegistry};
pub use upstream::{PollingConnector, UpstreamConnector, UpstreamHandle};
