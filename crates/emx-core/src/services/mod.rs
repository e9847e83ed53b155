pub mod config_loader;
pub mod controller;
pub mod emulator;
pub mod environment;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod supervisor;
pub mod validate;
