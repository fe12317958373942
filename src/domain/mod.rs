pub mod catalog;
pub mod payment;
pub mod phone;
pub mod ports;
