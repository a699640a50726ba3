//! Input plumbing
//!
//! [`GestureInbox`] buffers normalized gestures pushed by a transport callback
//! until the session pumps them. [`KeyInput`] is the keyboard/click fallback.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::services::GestureHandler;
use crate::sim::{GestureEvent, normalize};

/// Most gestures held between pumps; the oldest are dropped beyond this
pub const INBOX_CAPACITY: usize = 64;

#[derive(Debug)]
struct InboxState {
    pending: VecDeque<GestureEvent>,
    enabled: bool,
    dropped: u64,
}

/// Shared, bounded gesture buffer.
///
/// Clones share one buffer. Back-to-back continuous positions collapse to the
/// newest one; discrete and slap gestures keep arrival order. While disabled
/// (no active round) every push is discarded.
#[derive(Debug, Clone)]
pub struct GestureInbox {
    inner: Rc<RefCell<InboxState>>,
}

impl Default for GestureInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureInbox {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(InboxState {
                pending: VecDeque::with_capacity(INBOX_CAPACITY),
                enabled: true,
                dropped: 0,
            })),
        }
    }

    /// Normalize and buffer a raw payload
    pub fn push_raw(&self, raw: &str) -> bool {
        match normalize(raw) {
            Some(event) => self.push(event),
            None => false,
        }
    }

    /// Buffer a normalized gesture; false if the inbox is disabled
    pub fn push(&self, event: GestureEvent) -> bool {
        let mut state = self.inner.borrow_mut();
        if !state.enabled {
            return false;
        }

        if event.is_continuous() {
            if let Some(last) = state.pending.back_mut() {
                if last.is_continuous() {
                    *last = event;
                    return true;
                }
            }
        }

        if state.pending.len() >= INBOX_CAPACITY {
            state.pending.pop_front();
            state.dropped += 1;
            log::warn!("Gesture inbox full, dropped oldest ({} total)", state.dropped);
        }
        state.pending.push_back(event);
        true
    }

    /// Take every pending gesture in arrival order
    pub fn drain(&self) -> Vec<GestureEvent> {
        self.inner.borrow_mut().pending.drain(..).collect()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().pending.clear();
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.inner.borrow_mut();
        state.enabled = enabled;
        if !enabled {
            state.pending.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().pending.is_empty()
    }

    /// Gestures lost to the capacity limit
    pub fn dropped(&self) -> u64 {
        self.inner.borrow().dropped
    }

    /// Transport callback feeding this inbox
    pub fn handler(&self) -> GestureHandler {
        let inbox = self.clone();
        Box::new(move |raw: &str| {
            inbox.push_raw(raw);
        })
    }
}

/// Keyboard/click fallback input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    ArrowLeft,
    ArrowRight,
    Space,
    Click,
}

impl KeyInput {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" | "Left" => Some(KeyInput::ArrowLeft),
            "ArrowRight" | "Right" => Some(KeyInput::ArrowRight),
            " " | "Spacebar" | "Space" => Some(KeyInput::Space),
            _ => None,
        }
    }
}
