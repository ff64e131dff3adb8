//! Client for the Yapı Kredi Posnet XML payment service, plus an HTTP gateway around it.
//!
//! The client signs and sends direct transactions (sale, pre-auth, post-auth,
//! refund, cancel) and drives the three legs of 3-D Secure. The gateway binary
//! exposes the same operations as a JSON API.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
