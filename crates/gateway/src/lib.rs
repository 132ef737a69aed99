//! Gateway client: one persistent, authenticated WebSocket to the gateway,
//! with independent calls multiplexed over it.
//!
//! Lifecycle:
//! 1. Open the socket and wait briefly for `connect.challenge`
//! 2. Send `connect` (on the challenge, or unprompted once the grace expires)
//! 3. Accept calls once the gateway answers `connect` with `ok: true`
//! 4. On socket loss, fail every in-flight call and reconnect after a delay
//!
//! Consumers only see [`GatewayClient::submit`] and the authentication flag;
//! frame shapes live in `botch-protocol`. The request table and socket halves
//! stay internal:
//!
//! ```compile_fail
//! use botch_gateway::pending::PendingRequests;
//! ```
//!
//! ```compile_fail
//! use botch_gateway::ws::WsWriter;
//! ```

pub mod client;
pub(crate) mod connection;
pub mod error;
pub mod identity;
pub(crate) mod pending;
pub(crate) mod ws;

pub use {
    client::{ClientDescriptor, ClientOptions, GatewayClient},
    connection::ConnectionState,
    error::{Error, Result},
    identity::{DeviceIdentity, IdentityError, IdentityStore},
};
