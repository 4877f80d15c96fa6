//! CLI command implementation

pub mod dates;
pub mod error;
pub mod load;

pub use error::CliError;
pub use load::{Action, Cli, LoadOptions, OutputFormat};

/// Run completed, or options were rejected by validation
pub const EXIT_OK: i32 = 0;

/// Run failed
pub const EXIT_ERROR: i32 = 1;

/// Run stopped on SIGINT or SIGTERM
pub const EXIT_INTERRUPT: i32 = 130;
