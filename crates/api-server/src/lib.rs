#![warn(clippy::unwrap_used)]

pub mod directory_rest;
pub mod jobs;
pub mod messaging_rest;
pub mod rest;
pub mod server;
pub mod swagger;

pub use jobs::DispatchJobRegistry;
pub use rest::AppState;
pub use server::{build_router, ApiServer};
pub use swagger::ApiDoc;
