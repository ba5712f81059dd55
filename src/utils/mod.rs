pub mod error;
pub mod output;
pub mod time_format;

pub use error::*;
pub use output::*;
