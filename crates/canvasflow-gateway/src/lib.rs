mod routes;
mod server;
mod state;

pub use routes::NDJSON;
pub use server::GatewayServer;
