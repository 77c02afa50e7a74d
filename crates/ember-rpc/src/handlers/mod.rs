//! One module per JSON-RPC namespace, mirroring the teacher's
//! `handlers::{auth_users, events, ...}` convention.

pub mod configuration;
pub mod jsonrpc;
pub mod rules;

pub use configuration::ConfigurationHandler;
pub use jsonrpc::{IntrospectionCell, JsonRpcHandler};
pub use rules::RulesHandler;
