pub mod agent;
pub mod benchmark;
pub mod catalog;
pub mod classifier;
pub mod command;
pub mod config;
pub mod connections;
pub mod error;
pub mod followup;
pub mod handlers;
pub mod io;
pub mod json_extract;
pub mod model;
pub mod paths;
pub mod router;
pub mod session;
pub mod settings;
pub mod testing;
pub mod types;
pub mod wizard;

pub use agent::Agent;
pub use error::{AgentError, Result};
