//! # Ion Registry
//!
//! Run-wide assignment of dense integer ids to ion species names. One
//! registry is shared (`Arc`) by every worker accumulator and the master;
//! lookup and insertion happen in a single critical section so two workers
//! meeting the same new ion never allocate two ids for it.

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct IonTable {
    ids: HashMap<String, u32>,
    next_id: u32,
}

/// Thread-safe name → id registry
#[derive(Debug, Default)]
pub struct IonRegistry {
    table: Mutex<IonTable>,
}

impl IonRegistry {
    /// Id of `name`, allocating the next one on first sight
    pub fn id_for(&self, name: &str) -> u32 {
        let mut table = self.table.lock();
        if let Some(&id) = table.ids.get(name) {
            return id;
        }
        let id = table.next_id;
        table.next_id += 1;
        table.ids.insert(name.to_string(), id);
        log::debug!("Registered ion {} with id {}", name, id);
        id
    }

    /// Id of `name` if already registered
    pub fn get(&self, name: &str) -> Option<u32> {
        self.table.lock().ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ions ordered by id
    pub fn snapshot(&self) -> Vec<(String, u32)> {
        let table = self.table.lock();
        let mut entries: Vec<(String, u32)> =
            table.ids.iter().map(|(name, &id)| (name.clone(), id)).collect();
        entries.sort_by_key(|&(_, id)| id);
        entries
    }
}
