//! Energy operator service: configuration and HTTP surface

pub mod api;
pub mod config;
pub mod shutdown;
