pub mod blank;
pub mod config;
pub mod engine;
pub mod input;
pub mod notify;
pub mod panic_handler;
pub mod render;
pub mod session;
pub mod sync;
pub mod viewer;

// Re-export the composed surface
pub use viewer::{action_for_key, Viewer, ViewerAction, ViewerTelemetry};
