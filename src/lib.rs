pub mod api;
pub mod config;
pub mod db;
pub mod draft;
pub mod server;
pub mod suggest;

pub use self::config::Config;
