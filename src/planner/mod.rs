pub mod engine;
pub mod history;
pub mod parser;
pub mod prompt;
pub mod state;
