//! Domain layer: payment records, their lifecycle and the ports the rest of the
//! crate implements.

pub mod audit;
pub mod clock;
pub mod event;
pub mod fee;
pub mod money;
pub mod payment;
pub mod ports;
pub mod query;
pub mod status;
