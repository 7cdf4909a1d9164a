//! Brightness change notifications.

use std::sync::mpsc::Sender;

use log::debug;

/// Why the brightness changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrightnessChangeCause {
    AmbientLight,
    UserRequest,
    /// Policy driven: inactivity, lid, suspend and the like.
    Other,
}

/// Names the controller a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessChange {
    pub percent: f64,
    pub cause: BrightnessChangeCause,
    pub source: ControllerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
pub struct ObserverBus {
    source: ControllerId,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Sender<BrightnessChange>)>,
}

impl ObserverBus {
    pub fn new(source: ControllerId) -> Self {
        Self {
            source,
            next_id: 0,
            subscribers: vec![],
        }
    }

    pub fn source(&self) -> ControllerId {
        self.source
    }

    pub fn subscribe(&mut self, listener: Sender<BrightnessChange>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, listener));
        id
    }

    /// Returns `false` if `id` wasn't subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver one message to every subscriber. Subscribers that hung up are
    /// dropped.
    pub fn notify(&mut self, percent: f64, cause: BrightnessChangeCause) {
        let change = BrightnessChange {
            percent,
            cause,
            source: self.source,
        };
        self.subscribers.retain(|(id, tx)| {
            let alive = tx.send(change).is_ok();
            if !alive {
                debug!("Dropping disconnected subscriber {id:?}");
            }
            alive
        });
    }
}
