pub mod handlers;
pub mod middleware;
pub mod orchestrator;
pub mod packs;
pub mod routes;

pub use routes::create_router;
