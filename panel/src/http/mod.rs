//! Presentation boundary over HTTP.

mod api;
mod error;
pub mod server;
pub mod websocket;

pub use websocket::WsMessage;
