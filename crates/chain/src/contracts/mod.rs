pub mod item;
pub mod registry;

use model::{address::Address, amount::Amount};

use crate::events::Event;

/// Execution context of one transaction.
#[derive(Debug)]
pub struct Exec {
    pub caller: Address,
    pub value: Amount,
    pub now: u64,
    events: Vec<Event>,
}

impl Exec {
    pub fn new(caller: Address, value: Amount, now: u64) -> Exec {
        Exec {
            caller,
            value,
            now,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn journal_len(&self) -> usize {
        self.events.len()
    }

    pub fn truncate_journal(&mut self, len: usize) {
        self.events.truncate(len);
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
