//! CLI command implementations

pub mod config;
pub mod gc;
pub mod produce;
pub mod sessions;

pub use config::execute as config;
pub use gc::execute as gc;
pub use produce::execute as produce;
pub use sessions::execute as sessions;
