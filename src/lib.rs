// Protocol Intake - multipart document intake with a Google Drive mirror

pub mod config;
pub mod models;
pub mod types;
pub mod storage;
pub mod sync;      // Remote Sync: folder resolution + concurrent uploads
pub mod routes;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
