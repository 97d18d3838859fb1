//! # minibus
//!
//! A very lightweight in-process synchronous message bus.
//!
//! Producers hand a message to a [`Bus`]; the bus routes it to every handler
//! registered for the message's exact runtime type and invokes them inline,
//! on the calling thread, before `send` returns. Handlers may themselves send
//! messages; a built-in reentrancy guard detects unbounded cyclic send chains
//! and fails the top-level call deterministically instead of overflowing the
//! stack.
//!
//! ## What this is not
//!
//! There is no queue, no background thread, no persistence and no subtype
//! matching. Dispatch is by exact type only, and a `Bus` is single-threaded
//! by construction (`!Send + !Sync`).
//!
//! ## Example
//!
//! ```
//! use minibus::Bus;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let bus = Bus::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let sink = Rc::clone(&seen);
//! bus.register_fn(move |message: &String| {
//!     sink.borrow_mut().push(message.clone());
//! });
//!
//! bus.send(&"hello".to_string()).unwrap();
//! assert_eq!(seen.borrow().as_slice(), ["hello".to_string()]);
//! ```

pub mod bus;
pub mod error;
pub mod subscribe;

pub use bus::{Bus, Handler, CYCLIC_DISPATCH_LIMIT};
pub use error::{BusError, Result};
pub use subscribe::Subscriber;
