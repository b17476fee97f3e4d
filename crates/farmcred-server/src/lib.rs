pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use config::FarmCredConfig;
pub use handlers::router;
pub use state::AppState;
