//! REST API layer

pub mod protocol;
pub mod routes;
pub mod server;

pub use routes::AppState;
pub use server::start_server;
