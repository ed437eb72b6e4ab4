//! Application layer containing the payment workflow orchestration.
//!
//! `PaymentService` owns the storage ports; `RegistrationService` and
//! `PaymentMonitor` drive the payment state machine from ILS outcomes, and
//! `PaymentEngine` replays recorded payment events.

pub mod engine;
pub mod monitor;
pub mod registration;
pub mod service;
