pub mod config;
pub mod emulator;
pub mod outcome;

pub use config::{EmulatorConfig, FunctionsConfig, ProjectConfig};
pub use emulator::{Emulator, EmulatorInfo, StartOptions};
pub use outcome::ProcessOutcome;
