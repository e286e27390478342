//! Run-time machinery: configuration, session store, and the flow runner.

pub mod config;
pub mod runner;
pub mod session;

pub use config::EngineConfig;
pub use runner::{FlowRunner, RunHandle, RunnerError};
pub use session::{
    InMemorySessionStore, RateLimitStatus, SessionSnapshot, SessionStore, SessionStoreError,
};
