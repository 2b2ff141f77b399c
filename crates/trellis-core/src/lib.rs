pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, TrellisError};
pub use traits::TextCompleter;
pub use types::RunId;
