//! HTTP gateway: receives Events API deliveries and hands mentions to the
//! bridge. Split out as a library so integration tests can assemble the
//! router without the binary.

pub mod app;
pub mod http;
