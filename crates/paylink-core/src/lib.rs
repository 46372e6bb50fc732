//! Core paylink library (config, session store, payment-link providers).

pub mod config;
pub mod providers;
pub mod session;
