//! Domain layer: order model, wire protocol, validation rules and the ports the
//! application layer drives.

pub mod event;
pub mod order;
pub mod ports;
pub mod protocol;
pub mod validation;
