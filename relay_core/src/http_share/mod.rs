pub mod server;
pub mod upload;
pub mod websocket;

pub use server::{HTTP_PORT, create_router, serve, start_relay_server};
