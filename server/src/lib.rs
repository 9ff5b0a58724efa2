pub mod config;
pub mod core;
pub mod inspect;
pub mod serve;

pub use config::{ServeArgs, ServerConfig};
pub use serve::build_router;
