//! Trap/return observer hooks
//!
//! An ordered list of optional hooks external collaborators can
//! register without the core depending on what they do. Observers
//! never mutate core state directly; they only observe the same data
//! the host would see through [`crate::host::HostRuntime`].

use crate::privilege::{Privilege, Trap};

/// One registered observer. Every field is optional: most observers
/// only care about one or two events.
#[derive(Default)]
pub struct Observer {
    pub reset: Option<Box<dyn FnMut()>>,
    pub halt_restart: Option<Box<dyn FnMut(bool)>>,
    pub trap: Option<Box<dyn FnMut(Trap, Privilege)>>,
    pub eret: Option<Box<dyn FnMut(Privilege)>>,
    pub first_exception: Option<Box<dyn FnMut(Trap)>>,
}

/// The ordered list of observers the core notifies. Registration order
/// is preserved and is the order notifications fire in.
#[derive(Default)]
pub struct Observers {
    entries: Vec<Observer>,
    saw_first_exception: bool,
}

impl Observers {
    pub fn register(&mut self, observer: Observer) {
        self.entries.push(observer);
    }

    pub fn notify_reset(&mut self) {
        for entry in self.entries.iter_mut() {
            if let Some(hook) = entry.reset.as_mut() {
                hook();
            }
        }
        self.saw_first_exception = false;
    }

    pub fn notify_halt_restart(&mut self, halted: bool) {
        for entry in self.entries.iter_mut() {
            if let Some(hook) = entry.halt_restart.as_mut() {
                hook(halted);
            }
        }
    }

    pub fn notify_trap(&mut self, trap: Trap, target: Privilege) {
        for entry in self.entries.iter_mut() {
            if let Some(hook) = entry.trap.as_mut() {
                hook(trap, target);
            }
        }
        if !self.saw_first_exception {
            self.saw_first_exception = true;
            for entry in self.entries.iter_mut() {
                if let Some(hook) = entry.first_exception.as_mut() {
                    hook(trap);
                }
            }
        }
    }

    pub fn notify_eret(&mut self, new_mode: Privilege) {
        for entry in self.entries.iter_mut() {
            if let Some(hook) = entry.eret.as_mut() {
                hook(new_mode);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn first_exception_hook_fires_once() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        let mut observers = Observers::default();
        observers.register(Observer {
            first_exception: Some(Box::new(move |_| *count_clone.borrow_mut() += 1)),
            ..Default::default()
        });

        observers.notify_trap(Trap::Exception(crate::privilege::Exception::IllegalInstruction), Privilege::Machine);
        observers.notify_trap(Trap::Exception(crate::privilege::Exception::Breakpoint), Privilege::Machine);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn reset_clears_first_exception_latch() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        let mut observers = Observers::default();
        observers.register(Observer {
            first_exception: Some(Box::new(move |_| *count_clone.borrow_mut() += 1)),
            ..Default::default()
        });

        observers.notify_trap(Trap::Exception(crate::privilege::Exception::IllegalInstruction), Privilege::Machine);
        observers.notify_reset();
        observers.notify_trap(Trap::Exception(crate::privilege::Exception::Breakpoint), Privilege::Machine);
        assert_eq!(*count.borrow(), 2);
    }
}
