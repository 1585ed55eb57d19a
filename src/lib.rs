//! Startup scaffold for an LLM agent process.
//!
//! Loads a `.env` file into the process environment, resolves the chat-model
//! settings a client would read from it, and sets up `tracing`.

pub mod cli;
pub mod config;
pub mod env;
pub mod logger;

pub use config::{Config, ConfigError};
pub use env::{EnvError, EnvLoader, LoadReport, load_dotenv};
