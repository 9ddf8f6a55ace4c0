//! Change-notification fabric shared by all storage banks.
//!
//! Dispatch is single-threaded and synchronous: a publication is delivered
//! to every interested subscriber before control returns to the caller.
//! Every publication carries the [`Origin`] of the component that caused
//! the change, and the hub never delivers a notification back to a
//! subscriber registered under that same origin. Components that both
//! write and observe the same bank rely on this to avoid feeding their
//! own writes back into themselves.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Which storage bank a notification refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BankKind {
    General,
    Status,
    Vector,
    Memory,
}

/// Opaque identity of a publishing/subscribing component.
///
/// Tokens are handed out by [`NotificationHub::register_origin`] and are
/// only meaningful within the hub that issued them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Origin(u32);

/// Character range into a source line that failed to parse.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// User-visible error or warning produced while resolving or running an
/// instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }
}

/// A single observable state change or signal.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A word in a bank took a new value.
    ValueChanged {
        bank: BankKind,
        index: u32,
        value: u32,
    },
    /// The program counter took a new value (in addition to the generic
    /// `ValueChanged` for register 15).
    PcChanged { value: u32 },
    /// A bank's addressing changed (memory resize/re-offset); cached views
    /// of its content are stale.
    SettingsChanged {
        bank: BankKind,
        size_words: u32,
        offset_words: u32,
    },
    /// Ask observers to highlight one register slot.
    HighlightRegister { bank: BankKind, index: u32 },
    /// Ask observers to highlight a byte range of memory.
    HighlightMemory { byte_addr: u32, byte_len: u32 },
    /// Drop all transient highlights.
    ClearHighlights,
    /// A user-visible error to render next to the offending line.
    Diagnostic(Diagnostic),
}

type Callback = Rc<RefCell<dyn FnMut(Origin, &Notification)>>;

struct Subscriber {
    origin: Origin,
    callback: Callback,
}

/// Synchronous publish/subscribe hub.
///
/// Subscribers are plain closures; a closure may itself publish or write
/// to banks while handling a notification. The subscriber list is
/// snapshotted per publication, and a callback already on the stack is
/// never re-entered.
pub struct NotificationHub {
    subscribers: RefCell<Vec<Subscriber>>,
    next_origin: Cell<u32>,
}

impl NotificationHub {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            subscribers: RefCell::new(Vec::new()),
            next_origin: Cell::new(0),
        })
    }

    /// Mint a fresh origin token for one component.
    pub fn register_origin(&self) -> Origin {
        let id = self.next_origin.get();
        self.next_origin.set(id + 1);
        Origin(id)
    }

    /// Subscribe under `origin`. Notifications published with that same
    /// origin are not delivered to this callback.
    pub fn subscribe(
        &self,
        origin: Origin,
        callback: impl FnMut(Origin, &Notification) + 'static,
    ) {
        self.subscribers.borrow_mut().push(Subscriber {
            origin,
            callback: Rc::new(RefCell::new(callback)),
        });
    }

    /// Remove every subscription registered under `origin`.
    pub fn unsubscribe(&self, origin: Origin) {
        self.subscribers
            .borrow_mut()
            .retain(|sub| sub.origin != origin);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Deliver `notification` to every subscriber whose origin differs
    /// from `from`, synchronously, in subscription order.
    pub fn publish(&self, from: Origin, notification: &Notification) {
        let targets: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|sub| sub.origin != from)
            .map(|sub| Rc::clone(&sub.callback))
            .collect();
        for callback in targets {
            if let Ok(mut callback) = callback.try_borrow_mut() {
                callback(from, notification);
            }
        }
    }
}
