//! Command handlers, one module per subcommand group.

pub mod access;
pub mod audit;
pub mod auth;
pub mod devices;
pub mod monitor;
pub mod users;
