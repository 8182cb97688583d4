pub mod cli;
mod log;

pub use cli::run;
pub use cli::ux;
