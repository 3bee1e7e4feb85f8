pub mod builtin;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod signal;
pub mod stage;
pub mod types;
pub mod wiring;
