//! Chrome DevTools Protocol client.
//!
//! Only what the capture pipeline needs:
//! - `discovery` - `/json/list` and `/json/new` on the HTTP endpoint
//! - `session` - JSON-RPC over the target's WebSocket
//! - `connector` - the retrying connect sequence
//! - `listener` - the `Network.responseReceived` URL stream

mod connector;
mod discovery;
mod listener;
mod session;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

pub use connector::Connector;
pub use discovery::{DevToolsHttp, TargetInfo};
pub use listener::{ResponseStream, listen};
pub use session::Session;
