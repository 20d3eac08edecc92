pub mod backend;
pub mod server;
pub mod services;
