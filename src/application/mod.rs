//! Application layer orchestrating a payment attempt against the gateway.
//!
//! `PaymentStateMachine` owns the lifecycle, `StatusPoller` drives the
//! mobile-money rail's bounded refresh loop, and `PaymentSession` ties one
//! machine and one poller together behind a single mutex so session
//! operations always serialize.

pub mod poller;
pub mod session;
pub mod state_machine;
