/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The per-instance event bus.
//!
//! Topic subscribers receive messages over bounded channels so a slow
//! observer can never block the emulation loop: a full queue drops the
//! message for that subscriber and counts the overflow.
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::emulator::EmulatorState;

/// Subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    FrameStart,
    FrameEnd,
    AudioBufferHalfFull,
    StateChanged,
    BreakpointHit,
}

/// Messages published by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    FrameStart { frame: u64 },
    FrameEnd { frame: u64 },
    AudioBufferHalfFull { available: usize },
    StateChanged { state: EmulatorState },
    BreakpointHit { pc: u16 },
}

impl Message {
    pub fn topic(&self) -> Topic {
        match self {
            Message::FrameStart { .. } => Topic::FrameStart,
            Message::FrameEnd { .. } => Topic::FrameEnd,
            Message::AudioBufferHalfFull { .. } => Topic::AudioBufferHalfFull,
            Message::StateChanged { .. } => Topic::StateChanged,
            Message::BreakpointHit { .. } => Topic::BreakpointHit,
        }
    }
}

/// Identifies one subscription for unsubscribing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    topic: Topic,
    sender: Sender<Message>,
}

/// Topic → observer fan-out with non-blocking delivery.
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    overflow_count: u64,
}

/// Default queue depth of one subscription.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

impl Default for EventBus {
    fn default() -> Self {
        EventBus { subscribers: Vec::new(), next_id: 1, overflow_count: 0 }
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Subscribes to a topic; messages arrive on the returned receiver.
    pub fn subscribe(&mut self, topic: Topic) -> (SubscriberId, Receiver<Message>) {
        self.subscribe_with_depth(topic, DEFAULT_QUEUE_DEPTH)
    }

    pub fn subscribe_with_depth(
        &mut self,
        topic: Topic,
        depth: usize,
    ) -> (SubscriberId, Receiver<Message>) {
        let (sender, receiver) = bounded(depth.max(1));
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, topic, sender });
        (id, receiver)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|sub| sub.id != id);
    }

    /// Messages dropped because a subscriber queue was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers to every live subscriber of the message's topic; never
    /// blocks. Returns how many observers received it.
    pub fn publish(&mut self, message: Message) -> usize {
        let topic = message.topic();
        let mut delivered = 0;
        let mut overflow = 0;
        self.subscribers.retain(|sub| {
            if sub.topic != topic {
                return true;
            }
            match sub.sender.try_send(message) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    overflow += 1;
                    true
                }
                // receiver gone: drop the subscription
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
        self.overflow_count += overflow;
        delivered
    }
}
