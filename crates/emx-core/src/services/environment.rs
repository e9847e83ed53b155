use std::collections::HashMap;

use crate::models::Emulator;

use super::registry::ServiceRegistry;

/// Environment handed to a script: discovery variable name to `host:port`.
pub type EnvironmentMap = HashMap<String, String>;

/// Build the script environment from whatever emulators are currently running.
///
/// Emulators that are not registered, or that have no discovery variable,
/// contribute nothing.
pub fn build(registry: &dyn ServiceRegistry) -> EnvironmentMap {
    Emulator::ALL
        .into_iter()
        .filter_map(|emulator| {
            let var = emulator.discovery_var()?;
            let info = registry.get(emulator)?;
            Some((var.to_string(), info.address()))
        })
        .collect()
}
