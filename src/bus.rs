//! The dispatch core: typed handler registry and synchronous fan-out.
//!
//! A [`Bus`] maps each message type to the ordered set of handlers registered
//! for it. `send` resolves the handler set for the message's exact type and
//! invokes every handler inline, on the calling thread, before returning.
//! Handlers are free to send further messages; nesting depth is tracked and a
//! chain that exceeds [`CYCLIC_DISPATCH_LIMIT`] nested dispatches is cut off
//! and surfaced as [`BusError::CyclicDispatch`] to the top-level caller.
//!
//! # Example
//!
//! ```
//! use minibus::Bus;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let bus = Bus::new();
//! let hits = Rc::new(Cell::new(0));
//!
//! let counter = Rc::clone(&hits);
//! bus.register_fn(move |_: &i32| counter.set(counter.get() + 1));
//!
//! bus.send(&7).unwrap();
//! assert_eq!(hits.get(), 1);
//! ```

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{BusError, Result};

/// Maximum nesting depth for reentrant dispatch before the chain is treated
/// as cyclic and aborted.
pub const CYCLIC_DISPATCH_LIMIT: u32 = 50;

/// A registered callable for messages of type `T`.
///
/// A `Handler` carries an identity: cloning shares it, while [`Handler::new`]
/// mints a fresh one. Registration is idempotent per identity, so registering
/// the same `Handler` (or a clone of it) twice does not cause a second
/// invocation on dispatch.
pub struct Handler<T> {
    f: Rc<dyn Fn(&T)>,
}

impl<T> Handler<T> {
    /// Wrap a closure into a handler with a fresh identity.
    pub fn new(f: impl Fn(&T) + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    fn call(&self, message: &T) {
        (self.f)(message)
    }

    fn same_identity(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

/// Ordered, identity-unique collection of handlers for one message type.
type HandlerSet<T> = Vec<Handler<T>>;

/// Re-enters the typed dispatch path for the concrete type behind an erased
/// message.
type ErasedInvoker = fn(&Bus, &dyn Any) -> Result<()>;

/// Registry entry for one message type.
///
/// The typed handler set and its erased invoker are stored together so that
/// neither can exist without the other; the typed and erased dispatch paths
/// always resolve to the same handler set.
struct Entry {
    handlers: Box<dyn Any>,
    invoke: ErasedInvoker,
}

/// In-process synchronous message bus.
///
/// All state is per instance: two buses never observe each other's
/// registrations or dispatches. Interior mutability is single-threaded
/// (`Rc`/`RefCell`/`Cell`), which makes the type `!Send + !Sync`; callers
/// needing concurrent producers must funnel sends through one thread.
///
/// There is no unregistration and no teardown: handlers accumulate for the
/// lifetime of the bus.
pub struct Bus {
    registry: RefCell<HashMap<TypeId, Entry>>,
    depth: Cell<u32>,
    tripped: Cell<bool>,
}

impl Bus {
    /// Create a new empty bus.
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
            tripped: Cell::new(false),
        }
    }

    /// Register a handler for messages of type `T`.
    ///
    /// The first registration for a type installs both the handler set and
    /// the erased invoker used by [`send_any`](Bus::send_any). Insertion uses
    /// set semantics: a handler whose identity is already present is not
    /// added again, and registration order is preserved for dispatch.
    pub fn register<T: Any>(&self, handler: Handler<T>) {
        let mut registry = self.registry.borrow_mut();
        let entry = registry.entry(TypeId::of::<T>()).or_insert_with(|| Entry {
            handlers: Box::new(HandlerSet::<T>::new()),
            invoke: invoke_erased::<T>,
        });
        let set = entry
            .handlers
            .downcast_mut::<HandlerSet<T>>()
            .expect("handler set stored under its own TypeId");
        if !set.iter().any(|existing| existing.same_identity(&handler)) {
            set.push(handler);
        }
    }

    /// Register a closure for messages of type `T`.
    ///
    /// Each call wraps the closure into a fresh [`Handler`] identity, so
    /// calling this twice registers two distinct handlers. The handler is
    /// returned in case the caller wants to hold on to its identity.
    pub fn register_fn<T: Any>(&self, f: impl Fn(&T) + 'static) -> Handler<T> {
        let handler = Handler::new(f);
        self.register(handler.clone());
        handler
    }

    /// Dispatch a message to every handler registered for its type.
    ///
    /// Handlers run in registration order, synchronously, on the calling
    /// thread; a handler may itself call `send`, recursing through this same
    /// routine. A message type with no registered handlers is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::CyclicDispatch`] if the recursive dispatch chain
    /// started by this call exceeded [`CYCLIC_DISPATCH_LIMIT`] nested sends.
    /// The error is raised only at the top-level frame; the bus is fully
    /// usable again immediately afterwards.
    ///
    /// Handler panics are not caught; they propagate to the caller unchanged.
    pub fn send<T: Any>(&self, message: &T) -> Result<()> {
        if self.tripped.get() {
            // Tripped state: ignore sends until the stack unwinds.
            return Ok(());
        }

        // Snapshot the handler set so handlers can re-enter register/send
        // without holding the registry borrow.
        let handlers: HandlerSet<T> = {
            let registry = self.registry.borrow();
            match registry.get(&TypeId::of::<T>()) {
                Some(entry) => entry
                    .handlers
                    .downcast_ref::<HandlerSet<T>>()
                    .expect("handler set stored under its own TypeId")
                    .clone(),
                None => return Ok(()),
            }
        };

        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        if depth >= CYCLIC_DISPATCH_LIMIT {
            tracing::warn!(
                message_type = std::any::type_name::<T>(),
                depth,
                "cyclic dispatch limit reached, aborting fan-out"
            );
            self.tripped.set(true);
            return Ok(());
        }

        tracing::trace!(
            message_type = std::any::type_name::<T>(),
            handlers = handlers.len(),
            depth,
            "dispatching message"
        );
        for handler in &handlers {
            handler.call(message);
        }

        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 1 && self.tripped.get() {
            // The recursive subtree under this top-level frame tripped the
            // limit; surface it once, here, and leave the bus fresh.
            self.depth.set(0);
            self.tripped.set(false);
            return Err(BusError::CyclicDispatch);
        }

        Ok(())
    }

    /// Dispatch a type-erased message by its runtime type.
    ///
    /// Resolves the erased invoker installed at registration time and
    /// delegates into the typed [`send`](Bus::send) path for the concrete
    /// type actually carried by the value (the cyclic-limit check therefore
    /// applies exactly once). A runtime type with no registered handlers is a
    /// silent no-op.
    pub fn send_any(&self, message: &dyn Any) -> Result<()> {
        let invoke = {
            let registry = self.registry.borrow();
            match registry.get(&message.type_id()) {
                Some(entry) => entry.invoke,
                None => return Ok(()),
            }
        };
        invoke(self, message)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke_erased<T: Any>(bus: &Bus, message: &dyn Any) -> Result<()> {
    let message = message
        .downcast_ref::<T>()
        .expect("invoker stored under its message TypeId");
    bus.send(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_send() {
        let bus = Bus::new();
        let seen: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

        let sink = Rc::clone(&seen);
        bus.register_fn(move |message: &String| {
            *sink.borrow_mut() = Some(message.clone());
        });

        bus.send(&"hello".to_string()).unwrap();

        assert_eq!(seen.borrow().as_deref(), Some("hello"));
    }

    #[test]
    fn test_send_without_handlers_is_noop() {
        let bus = Bus::new();

        assert_eq!(bus.send(&42u64), Ok(()));
    }

    #[test]
    fn test_two_handlers_both_receive() {
        let bus = Bus::new();
        let first: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let second: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

        let sink = Rc::clone(&first);
        bus.register_fn(move |message: &String| {
            *sink.borrow_mut() = Some(message.clone());
        });
        let sink = Rc::clone(&second);
        bus.register_fn(move |message: &String| {
            *sink.borrow_mut() = Some(message.clone());
        });

        bus.send(&"hello".to_string()).unwrap();

        assert_eq!(first.borrow().as_deref(), Some("hello"));
        assert_eq!(second.borrow().as_deref(), Some("hello"));
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = Bus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let sink = Rc::clone(&order);
            bus.register_fn(move |_: &i32| sink.borrow_mut().push(tag));
        }

        bus.send(&0).unwrap();

        assert_eq!(order.borrow().as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_registration_is_idempotent() {
        let bus = Bus::new();
        let hits = Rc::new(Cell::new(0));

        let counter = Rc::clone(&hits);
        let handler = Handler::new(move |_: &i32| counter.set(counter.get() + 1));
        bus.register(handler.clone());
        bus.register(handler);

        bus.send(&0).unwrap();

        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_register_fn_mints_distinct_identities() {
        let bus = Bus::new();
        let hits = Rc::new(Cell::new(0));

        for _ in 0..2 {
            let counter = Rc::clone(&hits);
            bus.register_fn(move |_: &i32| counter.set(counter.get() + 1));
        }

        bus.send(&0).unwrap();

        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_buses_are_independent() {
        let bus_a = Bus::new();
        let bus_b = Bus::new();
        let seen: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

        let sink = Rc::clone(&seen);
        bus_a.register_fn(move |message: &String| {
            *sink.borrow_mut() = Some(message.clone());
        });

        bus_b.send(&"hello".to_string()).unwrap();

        assert_eq!(*seen.borrow(), None);
    }

    #[test]
    fn test_send_routes_by_type() {
        let bus = Bus::new();
        let numbers = Rc::new(RefCell::new(Vec::new()));
        let strings = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&numbers);
        bus.register_fn(move |n: &i32| sink.borrow_mut().push(*n));
        let sink = Rc::clone(&strings);
        bus.register_fn(move |s: &String| sink.borrow_mut().push(s.clone()));

        bus.send(&1).unwrap();
        bus.send(&"one".to_string()).unwrap();
        bus.send(&2).unwrap();

        assert_eq!(numbers.borrow().as_slice(), [1, 2]);
        assert_eq!(strings.borrow().as_slice(), ["one".to_string()]);
    }

    #[test]
    fn test_send_any_routes_by_runtime_type() {
        let bus = Bus::new();
        let seen = Rc::new(Cell::new(0));

        let sink = Rc::clone(&seen);
        bus.register_fn(move |n: &i32| sink.set(*n));

        let boxed: Box<dyn Any> = Box::new(7);
        bus.send_any(boxed.as_ref()).unwrap();

        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_send_any_without_handlers_is_noop() {
        let bus = Bus::new();

        let boxed: Box<dyn Any> = Box::new("orphan".to_string());
        assert_eq!(bus.send_any(boxed.as_ref()), Ok(()));
    }
}
