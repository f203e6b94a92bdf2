pub mod config;
pub mod error;
pub mod metric;
pub mod rule;
pub mod state;
pub mod util;

pub use config::Config;
pub use error::*;
pub use metric::*;
pub use rule::*;
pub use state::*;
