pub mod client;
pub mod config;
pub mod errors;
pub mod hub;

pub use podspace_common as common;
