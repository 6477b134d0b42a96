use std::sync::{Arc, Mutex, MutexGuard};

use cvtdemo_contract::Interaction;

/// Append-only, ordered record of captured interactions.
///
/// Clones share the same log. Entries are only removed by [`clear`].
///
/// [`clear`]: InteractionLog::clear
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    entries: Arc<Mutex<Vec<Interaction>>>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, interaction: Interaction) {
        self.lock().push(interaction);
    }

    /// A copy of everything recorded so far, in order.
    pub fn snapshot(&self) -> Vec<Interaction> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Poisoning is ignored: no operation here leaves the Vec inconsistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Interaction>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
