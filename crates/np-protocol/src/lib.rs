pub mod commands;
pub mod results;
pub mod state;

pub use commands::*;
pub use results::*;
pub use state::*;
