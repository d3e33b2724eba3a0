pub mod config;
pub mod error;
pub mod workflow;

pub use config::{load_dotenv, NodeConfig};
pub use error::*;
pub use workflow::*;
