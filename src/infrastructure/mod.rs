//! Adapters for the domain ports: the mutual-TLS HTTPS transport and
//! channel-backed event sinks.

pub mod channel;
pub mod https;
