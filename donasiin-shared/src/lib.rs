pub mod api;
pub mod auth;
pub mod domain;
pub mod jwt;
pub mod mask;
pub mod period;
pub mod week;
