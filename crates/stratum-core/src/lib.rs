pub mod batch;
pub mod container;
pub mod context;
pub mod error;
pub mod identity;
pub mod io;
pub mod naming;
pub mod orchestrator;
pub mod paths;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod source;
pub mod station;
pub mod template;

pub use error::{DeployError, Result};
