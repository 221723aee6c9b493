// Infrastructure layer - External dependencies and adapters
pub mod child_process;
pub mod chunked_json;
pub mod config;
pub mod http_response;
