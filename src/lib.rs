#![forbid(unsafe_code)]

pub mod arbiter;
pub mod clic;
pub mod config;
pub mod csr;
pub mod debug;
pub mod error;
pub mod fetch;
pub mod hart;
pub mod host;
pub mod observer;
pub mod pending;
pub mod persist;
pub mod privilege;
pub mod trap;
pub mod xret;
