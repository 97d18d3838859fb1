//! Subscriber convenience layer - bulk handler registration.
//!
//! Rust has no method reflection to scan a handler object for
//! single-argument methods, so the bulk-registration convenience is an
//! explicit trait: a type implements [`Subscriber`] and registers each of its
//! handlers through the ordinary [`Bus`] registration primitives. This layer
//! adds no invariants of its own; it is pure sugar over
//! [`Bus::register`](crate::Bus::register).
//!
//! # Example
//!
//! ```
//! use minibus::{Bus, Subscriber};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! struct Audit {
//!     log: Rc<RefCell<Vec<String>>>,
//! }
//!
//! impl Subscriber for Audit {
//!     fn subscribe(&self, bus: &Bus) {
//!         let log = Rc::clone(&self.log);
//!         bus.register_fn(move |message: &String| {
//!             log.borrow_mut().push(message.clone());
//!         });
//!     }
//! }
//!
//! let bus = Bus::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let audit = Audit { log: Rc::clone(&log) };
//!
//! bus.auto_register(&[&audit]).unwrap();
//! bus.send(&"hello".to_string()).unwrap();
//! assert_eq!(log.borrow().len(), 1);
//! ```

use std::any::Any;

use crate::bus::Bus;
use crate::error::{BusError, Result};

/// A handler object that knows how to register its handlers on a bus.
pub trait Subscriber {
    /// Register this subscriber's handlers via the bus's registration
    /// primitives.
    fn subscribe(&self, bus: &Bus);
}

impl Bus {
    /// Register every handler of every given subscriber, in order.
    ///
    /// Returns `&self` so registration calls can be chained.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSubscribers`] if the list is empty.
    pub fn auto_register(&self, subscribers: &[&dyn Subscriber]) -> Result<&Self> {
        if subscribers.is_empty() {
            return Err(BusError::NoSubscribers);
        }

        for subscriber in subscribers {
            subscriber.subscribe(self);
        }

        Ok(self)
    }
}

/// Blanket subscriber for a single typed closure, handy when a full
/// [`Subscriber`] type is overkill.
pub struct FnSubscriber<T, F> {
    f: F,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> FnSubscriber<T, F>
where
    T: Any,
    F: Fn(&T) + Clone + 'static,
{
    /// Wrap a closure so it can participate in [`Bus::auto_register`].
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, F> Subscriber for FnSubscriber<T, F>
where
    T: Any,
    F: Fn(&T) + Clone + 'static,
{
    fn subscribe(&self, bus: &Bus) {
        bus.register_fn(self.f.clone());
    }
}
