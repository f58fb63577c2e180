pub mod handlers;
pub mod middleware;
pub mod research;
pub mod routes;
pub mod ws;

pub use routes::create_router;
