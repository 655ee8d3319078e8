pub mod config;
pub mod db;
pub mod enrich;
pub mod import;
pub mod model;
pub mod pipeline;
pub mod platform;
pub mod sync;
pub mod validate;
