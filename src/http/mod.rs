//! HTTP surface: the username-availability endpoint guarded by the
//! throttle gate.

pub mod directory;
pub mod handler;
pub mod server;

pub use directory::{MemoryDirectory, UserDirectory};
pub use handler::AppState;
pub use server::HttpServer;
