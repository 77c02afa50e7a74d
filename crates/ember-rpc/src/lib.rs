//! JSON-RPC dispatch core: wire framing, the authentication gate,
//! per-namespace handlers, the notification bus, and the transports that
//! feed requests into it. `ember-server` wires these modules together into
//! a running process; this crate only knows how to answer one request at
//! a time and how to fan a [`events::CoreEvent`] out to every connected,
//! notification-enabled client.

pub mod config;
pub mod context;
pub mod core;
pub mod drivers;
pub mod envelope;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod registry;
pub mod reply;
pub mod transport;

pub use context::{ClientId, ClientTable, RequestContext};
pub use core::{Outbound, RpcCore, ServerInfo, PROTOCOL_VERSION};
pub use drivers::{spawn_event_driver, spawn_time_driver};
pub use envelope::{split_method, RpcMessage, RpcRequest};
pub use events::{CoreEvent, EventBus};
pub use registry::{HandlerRegistry, IntrospectionDocument, MethodSpec, RpcHandler};
pub use reply::{AsyncReply, ReplyOutcome, RpcOutcome};
pub use transport::{Multiplexer, NullTransport, TcpLineTransport, Transport, TransportError, WebSocketTransport};
