pub mod common;
pub mod gateway;
pub mod requests;
pub mod responses;
