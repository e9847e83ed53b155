use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{Emulator, EmulatorInfo};

/// Read side of the emulator registry, as seen by script execution.
pub trait ServiceRegistry: Send + Sync {
    fn get(&self, emulator: Emulator) -> Option<EmulatorInfo>;
}

/// Process-wide record of running emulators and where they listen.
#[derive(Default)]
pub struct EmulatorRegistry {
    running: RwLock<BTreeMap<Emulator, EmulatorInfo>>,
}

impl EmulatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, emulator: Emulator, info: EmulatorInfo) {
        let mut running = self.running.write().unwrap_or_else(PoisonError::into_inner);
        running.insert(emulator, info);
    }

    pub fn remove(&self, emulator: Emulator) -> Option<EmulatorInfo> {
        let mut running = self.running.write().unwrap_or_else(PoisonError::into_inner);
        running.remove(&emulator)
    }

    /// Snapshot of running emulators in start order.
    pub fn running(&self) -> Vec<(Emulator, EmulatorInfo)> {
        let running = self.running.read().unwrap_or_else(PoisonError::into_inner);
        running.iter().map(|(e, i)| (*e, i.clone())).collect()
    }

    pub fn clear(&self) {
        let mut running = self.running.write().unwrap_or_else(PoisonError::into_inner);
        running.clear();
    }
}

impl ServiceRegistry for EmulatorRegistry {
    fn get(&self, emulator: Emulator) -> Option<EmulatorInfo> {
        let running = self.running.read().unwrap_or_else(PoisonError::into_inner);
        running.get(&emulator).cloned()
    }
}
