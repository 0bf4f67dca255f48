pub mod broadcast;
pub mod filters;
pub mod handlers;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod sessions;
pub mod uploads;
pub mod views;

pub use server::{start, ServerConfig, ServerHandle};
