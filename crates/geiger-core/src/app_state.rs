//! Cross-task channels and published state
//!
//! Data flows one way:
//!
//! ```text
//! acquisition ──BUCKET_CHANNEL──► MeasurementCore ──PUBLISHED──► UI / alarm / network
//!                                       │
//!                                       └──HISTORY_CHANNEL──► chart renderers
//! ```
//!
//! Only the measurement task mutates [`MeasurementCore`]. Everything other
//! tasks need is copied out into [`PUBLISHED`] under a critical section that
//! lasts only for the copy.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};
use log::warn;

use crate::acquisition::SecondBucket;
use crate::alarm::AlarmThresholds;
use crate::history::HistoryEvent;
use crate::measurement::{MeasurementCore, Snapshot};

/// Completed seconds that can queue up before acquisition starts carrying over
pub const BUCKET_CHANNEL_CAPACITY: usize = 8;

/// History events buffered per subscriber
pub const HISTORY_CHANNEL_CAPACITY: usize = 4;
/// Number of subscribers (display and network)
pub const HISTORY_SUBSCRIBERS: usize = 2;
/// Number of publishers (just the measurement task)
pub const HISTORY_PUBLISHERS: usize = 1;

pub type BucketChannel<const N: usize> = Channel<CriticalSectionRawMutex, SecondBucket, N>;

pub type HistoryChannel = PubSubChannel<
    CriticalSectionRawMutex,
    HistoryEvent,
    HISTORY_CHANNEL_CAPACITY,
    HISTORY_SUBSCRIBERS,
    HISTORY_PUBLISHERS,
>;

pub type HistoryPublisher<'a> = ImmediatePublisher<
    'a,
    CriticalSectionRawMutex,
    HistoryEvent,
    HISTORY_CHANNEL_CAPACITY,
    HISTORY_SUBSCRIBERS,
    HISTORY_PUBLISHERS,
>;

/// Per-second pulse counts from acquisition to the measurement task
pub static BUCKET_CHANNEL: BucketChannel<BUCKET_CHANNEL_CAPACITY> = Channel::new();

/// Finalized history intervals, for redraw-on-change consumers
pub static HISTORY_CHANNEL: HistoryChannel = PubSubChannel::new();

/// Latest measurement snapshot, written after every update tick
pub static PUBLISHED: SharedCell<Snapshot> = SharedCell::new(Snapshot::EMPTY);

/// Alarm thresholds, written by the settings owner. `None` means not configured.
pub static THRESHOLDS: SharedCell<Option<AlarmThresholds>> = SharedCell::new(None);

/// A `Copy` value shared between tasks.
///
/// Reads and writes copy the whole value inside one critical section, so a
/// reader never observes a half-written update.
pub struct SharedCell<T: Copy> {
    inner: Mutex<CriticalSectionRawMutex, Cell<T>>,
}

impl<T: Copy> SharedCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    pub fn store(&self, value: T) {
        self.inner.lock(|cell| cell.set(value));
    }

    pub fn load(&self) -> T {
        self.inner.lock(|cell| cell.get())
    }
}

/// Non-blocking sender side of the bucket channel.
///
/// Acquisition must never wait on the measurement task. When the channel is
/// full the pulses are kept and merged into the next bucket instead.
pub struct BucketForwarder<'a, const N: usize> {
    sender: Sender<'a, CriticalSectionRawMutex, SecondBucket, N>,
    carry: SecondBucket,
    overflows: u32,
}

impl<'a, const N: usize> BucketForwarder<'a, N> {
    pub fn new(channel: &'a BucketChannel<N>) -> Self {
        Self {
            sender: channel.sender(),
            carry: SecondBucket::default(),
            overflows: 0,
        }
    }

    /// Queue a bucket together with any carried-over pulses.
    ///
    /// Returns `false` if the channel was full and the pulses were carried.
    pub fn forward(&mut self, bucket: SecondBucket) -> bool {
        let outgoing = self.carry.merge(bucket);
        match self.sender.try_send(outgoing) {
            Ok(()) => {
                self.carry = SecondBucket::default();
                true
            }
            Err(TrySendError::Full(kept)) => {
                self.carry = kept;
                self.overflows = self.overflows.saturating_add(1);
                warn!(
                    "Bucket channel full, carrying {} pulses to the next second",
                    kept.pulses
                );
                false
            }
        }
    }

    /// Pulses waiting for room in the channel
    pub fn carried(&self) -> u32 {
        self.carry.pulses
    }

    pub fn overflows(&self) -> u32 {
        self.overflows
    }
}

/// Apply every queued bucket to the core. Returns how many were applied.
pub fn drain_buckets<const N: usize>(
    receiver: &Receiver<'_, CriticalSectionRawMutex, SecondBucket, N>,
    core: &mut MeasurementCore,
) -> usize {
    let mut applied = 0;
    while let Ok(bucket) = receiver.try_receive() {
        core.record_second(bucket);
        applied += 1;
    }
    applied
}

/// Broadcast closed history intervals without waiting on slow subscribers.
///
/// A lagging subscriber loses its oldest event rather than stalling the
/// measurement task.
pub fn publish_history<'a>(
    publisher: &HistoryPublisher<'a>,
    events: impl IntoIterator<Item = HistoryEvent>,
) {
    for event in events {
        publisher.publish_immediate(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasurementConfig;
    use crate::history::HistoryResolution;
    use embassy_sync::pubsub::WaitResult;

    #[test]
    fn test_shared_cell_store_and_load() {
        let cell = SharedCell::new(Snapshot::EMPTY);
        let mut snapshot = Snapshot::EMPTY;
        snapshot.total_pulses = 42;

        cell.store(snapshot);
        assert_eq!(cell.load().total_pulses, 42);
    }

    #[test]
    fn test_forwarder_carries_pulses_when_full() {
        let channel = BucketChannel::<2>::new();
        let mut forwarder = BucketForwarder::new(&channel);

        assert!(forwarder.forward(SecondBucket::new(1)));
        assert!(forwarder.forward(SecondBucket::new(2)));
        assert!(!forwarder.forward(SecondBucket::new(3)));
        assert!(!forwarder.forward(SecondBucket::new(4)));
        assert_eq!(forwarder.carried(), 7);
        assert_eq!(forwarder.overflows(), 2);

        let receiver = channel.receiver();
        assert_eq!(receiver.try_receive().map(|b| b.pulses), Ok(1));

        assert!(forwarder.forward(SecondBucket::new(5)));
        assert_eq!(forwarder.carried(), 0);

        let mut total = 0;
        while let Ok(bucket) = receiver.try_receive() {
            total += bucket.pulses;
        }
        assert_eq!(total, 2 + 7 + 5);
    }

    #[test]
    fn test_drain_applies_every_bucket() {
        let channel = BucketChannel::<4>::new();
        let mut forwarder = BucketForwarder::new(&channel);
        let mut core = MeasurementCore::new(MeasurementConfig::default()).unwrap();

        for pulses in [3, 0, 5] {
            forwarder.forward(SecondBucket::new(pulses));
        }

        assert_eq!(drain_buckets(&channel.receiver(), &mut core), 3);
        assert_eq!(core.total_pulses(), 8);
        assert_eq!(drain_buckets(&channel.receiver(), &mut core), 0);
    }

    #[test]
    fn test_history_events_reach_subscribers() {
        let channel = HistoryChannel::new();
        let mut subscriber = channel.subscriber().unwrap();
        let publisher = channel.immediate_publisher();

        let event = HistoryEvent {
            resolution: HistoryResolution::ShortTerm,
            mean_rate: 0.12,
            covered_secs: 180.0,
        };
        publish_history(&publisher, [event]);

        assert_eq!(subscriber.try_next_message(), Some(WaitResult::Message(event)));
        assert_eq!(subscriber.try_next_message(), None);
    }
}
