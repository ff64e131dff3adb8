pub mod crypto;
pub mod endpoints;
pub mod middleware;
pub mod posnet_client;
pub mod redirect;
