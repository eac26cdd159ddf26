//! dirnoded: the C10 API server (§4.10) wiring together every other
//! `dirnode-*` crate behind one gRPC listener.

pub mod auth;
pub mod config;
pub mod error;
pub mod grpc;
pub mod remote;
pub mod server;
