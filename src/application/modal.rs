use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModalId(u64);

// Explicit modal arena: every modal registers an id, and a single owner
// tracks which one is open instead of an ambient module-level flag.
#[derive(Debug, Default)]
pub struct ModalManager {
    next_id: u64,
    registered: HashSet<ModalId>,
    open: Option<ModalId>,
}

impl ModalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> ModalId {
        self.next_id += 1;
        let id = ModalId(self.next_id);
        self.registered.insert(id);
        id
    }

    pub fn unregister(&mut self, id: ModalId) {
        self.registered.remove(&id);
        if self.open == Some(id) {
            self.open = None;
        }
    }

    // Opening is refused while a different modal is up.
    pub fn open(&mut self, id: ModalId) -> bool {
        if !self.registered.contains(&id) {
            return false;
        }
        if self.open.is_some_and(|open| open != id) {
            return false;
        }
        self.open = Some(id);
        true
    }

    pub fn close(&mut self, id: ModalId) {
        if self.open == Some(id) {
            self.open = None;
        }
    }

    pub fn open_modal(&self) -> Option<ModalId> {
        self.open
    }

    pub fn is_open(&self, id: ModalId) -> bool {
        self.open == Some(id)
    }
}
