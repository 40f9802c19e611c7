pub mod progress;
pub mod store;
pub mod types;
