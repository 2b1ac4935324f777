//! Two-tier listener registries.
//!
//! System listeners are installed by the owner of the engine and can never be
//! removed. Transient listeners belong to callers, are removable one by one,
//! and are dropped wholesale on every `start` and `cleanup`. For any event
//! every system listener runs before any transient one.

use std::collections::HashMap;

use crate::events::{CountdownEvent, EventKind};

pub type Listener = Box<dyn FnMut(&CountdownEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    system: HashMap<EventKind, Vec<Listener>>,
    transient: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl Listeners {
    pub fn add_system(&mut self, kind: EventKind, listener: Listener) {
        self.system.entry(kind).or_default().push(listener);
    }

    pub fn add_transient(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.transient.entry(kind).or_default().push((id, listener));
        id
    }

    pub fn remove_transient(&mut self, id: ListenerId) -> bool {
        for list in self.transient.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    pub fn transient_count(&self) -> usize {
        self.transient.values().map(Vec::len).sum()
    }

    pub fn system_count(&self) -> usize {
        self.system.values().map(Vec::len).sum()
    }

    pub fn emit(&mut self, event: &CountdownEvent) {
        let kind = event.kind();
        if let Some(list) = self.system.get_mut(&kind) {
            for listener in list.iter_mut() {
                listener(event);
            }
        }
        if let Some(list) = self.transient.get_mut(&kind) {
            for (_, listener) in list.iter_mut() {
                listener(event);
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("system", &self.system_count())
            .field("transient", &self.transient_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn system_runs_before_transient() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();

        let l = log.clone();
        listeners.add_transient(EventKind::Stop, Box::new(move |_| l.borrow_mut().push("transient")));
        let l = log.clone();
        listeners.add_system(EventKind::Stop, Box::new(move |_| l.borrow_mut().push("system")));

        listeners.emit(&CountdownEvent::Stop);
        assert_eq!(*log.borrow(), vec!["system", "transient"]);
    }

    #[test]
    fn clearing_transient_keeps_system() {
        let hits = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::default();
        let h = hits.clone();
        listeners.add_system(EventKind::End, Box::new(move |_| *h.borrow_mut() += 1));
        let h = hits.clone();
        listeners.add_transient(EventKind::End, Box::new(move |_| *h.borrow_mut() += 10));

        listeners.clear_transient();
        listeners.emit(&CountdownEvent::End);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(listeners.system_count(), 1);
    }

    #[test]
    fn remove_single_transient() {
        let mut listeners = Listeners::default();
        let a = listeners.add_transient(EventKind::Tick, Box::new(|_| {}));
        listeners.add_transient(EventKind::Tick, Box::new(|_| {}));
        assert!(listeners.remove_transient(a));
        assert!(!listeners.remove_transient(a));
        assert_eq!(listeners.transient_count(), 1);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let hits = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::default();
        let h = hits.clone();
        listeners.add_transient(EventKind::Pause, Box::new(move |_| *h.borrow_mut() += 1));
        listeners.emit(&CountdownEvent::Stop);
        assert_eq!(*hits.borrow(), 0);
    }
}
