pub mod api;
pub mod cache;
pub mod config;
pub mod ingress;
pub mod init;
pub mod stats;
