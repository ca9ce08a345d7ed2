//! Message model: classes, received messages, and selective-receive filters.
//!
//! A message carries its sender, a class, a 32-bit tag, and a payload.
//! While queued, the payload lives in a fixed pool block owned by the
//! mailbox entry; dequeueing copies it out and returns the block. The
//! exception is a synchronous send, whose buffer stays pinned until the
//! receiver releases it (backpressure).

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::ActorId;

pub(crate) mod pool;

/// Classification of a message, used for selective receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageClass {
    /// Fire-and-forget asynchronous send (also the class of synchronous
    /// sends; those additionally carry a release handle).
    Notify,
    /// Request half of a correlated round trip.
    Request,
    /// Reply half of a correlated round trip.
    Reply,
    /// Timer expiry; the tag is the raw timer id.
    Timer,
    /// A link partner died; the tag encodes the exit reason.
    LinkExit,
    /// A monitored actor died; the tag encodes the exit reason.
    MonitorDown,
    /// Internal bus wakeup notification.
    BusEvent,
}

/// A message as seen by its receiver.
#[derive(Debug)]
pub struct Message {
    /// The actor that sent this message, or [`ActorId::RUNTIME`].
    pub sender: ActorId,
    /// Message class.
    pub class: MessageClass,
    /// Correlation tag, timer id, or user-defined discriminant.
    pub tag: u32,
    /// Payload bytes, copied out of the pool at dequeue.
    pub data: Vec<u8>,
    /// Sync-buffer slot still pinned by this message, when it came from a
    /// synchronous send. Cleared by release (explicit or implicit).
    pub(crate) sync_slot: Option<u32>,
}

impl Message {
    /// Whether this message came from a synchronous send and still holds
    /// its sender blocked awaiting release.
    pub fn is_sync(&self) -> bool {
        self.sync_slot.is_some()
    }
}

/// Filter triple for selective receive: each field independently either a
/// concrete value or a wildcard.
///
/// # Examples
///
/// ```rust
/// use hearth_rt::message::{MatchFilter, MessageClass};
///
/// let any = MatchFilter::any();
/// assert!(any.is_wildcard());
///
/// let replies = MatchFilter::any().with_class(MessageClass::Reply).with_tag(7);
/// assert!(!replies.is_wildcard());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    /// Match only messages from this sender.
    pub sender: Option<ActorId>,
    /// Match only messages of this class.
    pub class: Option<MessageClass>,
    /// Match only messages with this tag.
    pub tag: Option<u32>,
}

impl MatchFilter {
    /// A filter that matches every message.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to one sender.
    pub fn with_sender(mut self, sender: ActorId) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Restrict to one class.
    pub fn with_class(mut self, class: MessageClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Restrict to one tag.
    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Whether every field is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.sender.is_none() && self.class.is_none() && self.tag.is_none()
    }

    /// Whether a message with the given attributes satisfies the filter.
    pub fn matches(&self, sender: ActorId, class: MessageClass, tag: u32) -> bool {
        self.sender.is_none_or(|s| s == sender)
            && self.class.is_none_or(|c| c == class)
            && self.tag.is_none_or(|t| t == tag)
    }
}

impl fmt::Display for MatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filter(sender={:?}, class={:?}, tag={:?})",
            self.sender, self.class, self.tag
        )
    }
}

/// Where a queued message's payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Payload {
    /// No payload bytes.
    None,
    /// Block in the asynchronous payload pool; freed at dequeue.
    Data { slot: u32, len: u32 },
    /// Block in the sync-buffer pool; pinned until release.
    Sync { slot: u32, len: u32 },
}

/// A message while it sits in a mailbox (payload still pooled).
#[derive(Debug)]
pub(crate) struct QueuedMessage {
    pub sender: ActorId,
    pub class: MessageClass,
    pub tag: u32,
    pub payload: Payload,
}
