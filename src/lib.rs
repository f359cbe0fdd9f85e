//! Rotorlink - antenna rotator controller
//!
//! Core library: the HTTP front end, the multipart upload decoder, the serial
//! rotator driver and the legacy and UDP integrations that share it.

pub mod api;
pub mod config;
pub mod files;
pub mod http;
pub mod rotator;
pub mod server;
