// Copyright 2016 Claus Matzinger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::dto::Bmp180Reading;
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;
use std::thread;

/// Reserved boolean node reporting whether the store is reachable.
pub const CONNECTED_PATH: &str = ".info/connected";

/// Identifies one active feed registration. Released via `unsubscribe`;
/// holding a released handle is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedHandle(pub u64);

/// Change events pushed by an ordered-tail feed.
#[derive(Debug, Clone, PartialEq)]
pub enum TailEvent {
    Added(Bmp180Reading),
    Changed(Bmp180Reading),
    Moved(Bmp180Reading),
    Removed(Bmp180Reading),
    Error(StoreError),
}

/// Events pushed by a boolean value feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEvent {
    Changed(bool),
    Cancelled(StoreError),
}

/// Shared, append-only, timestamp-ordered telemetry sink.
///
/// Injected into both the sampling and the consumption flow. The store
/// serializes concurrent writers itself, so one handle may be shared.
pub trait TelemetryStore: Send + Sync {
    fn append(&self, collection: &str, reading: &Bmp180Reading) -> Result<(), StoreError>;

    ///
    /// Registers for change events on the last `count` entries of
    /// `collection`, ordered by `order_field`. The current tail entries are
    /// replayed as `Added` so late subscribers see existing history.
    ///
    fn subscribe_ordered_tail(
        &self,
        collection: &str,
        order_field: &str,
        count: usize,
        sink: Sender<TailEvent>,
    ) -> Result<FeedHandle, StoreError>;

    ///
    /// Registers for the boolean value at `path`. The current value is
    /// delivered immediately, changes are pushed afterwards.
    ///
    fn subscribe_value(&self, path: &str, sink: Sender<ValueEvent>)
        -> Result<FeedHandle, StoreError>;

    fn unsubscribe(&self, handle: FeedHandle);
}

/// Pumps every event from `input` into `output` until either side hangs up.
pub fn spawn_relay<I, O>(input: Receiver<I>, output: Sender<O>)
where
    I: Send + 'static,
    O: From<I> + Send + 'static,
{
    thread::spawn(move || {
        for event in input {
            if output.send(O::from(event)).is_err() {
                break;
            }
        }
    });
}

struct TailSubscription {
    collection: String,
    sink: Sender<TailEvent>,
}

struct ValueSubscription {
    path: String,
    sink: Sender<ValueEvent>,
}

/// In-process store backend: per-collection entry lists plus fan-out of
/// change events to registered feeds. Serves as the demo backend and as the
/// injection point in tests.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<Bmp180Reading>>>,
    tails: Mutex<HashMap<FeedHandle, TailSubscription>>,
    values: Mutex<HashMap<FeedHandle, ValueSubscription>>,
    connected: AtomicBool,
    next_handle: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            tails: Mutex::new(HashMap::new()),
            values: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Flips the `.info/connected` node and pushes the new value to every
    /// feed registered on it.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let values = self.values.lock().unwrap();
        for subscription in values.values() {
            if subscription.path == CONNECTED_PATH {
                let _ = subscription.sink.send(ValueEvent::Changed(connected));
            }
        }
    }

    fn allocate_handle(&self) -> FeedHandle {
        FeedHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }
}

impl TelemetryStore for MemoryStore {
    fn append(&self, collection: &str, reading: &Bmp180Reading) -> Result<(), StoreError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(StoreError::new("telemetry store is unreachable"));
        }
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(collection.to_owned())
            .or_insert_with(Vec::new)
            .push(*reading);
        drop(entries);

        let tails = self.tails.lock().unwrap();
        for subscription in tails.values() {
            if subscription.collection == collection {
                let _ = subscription.sink.send(TailEvent::Added(*reading));
            }
        }
        Ok(())
    }

    fn subscribe_ordered_tail(
        &self,
        collection: &str,
        order_field: &str,
        count: usize,
        sink: Sender<TailEvent>,
    ) -> Result<FeedHandle, StoreError> {
        if order_field != "date" {
            return Err(StoreError::new(format!(
                "unknown order field '{}'",
                order_field
            )));
        }
        let entries = self.entries.lock().unwrap();
        if let Some(list) = entries.get(collection) {
            let mut tail = list.clone();
            tail.sort_by_key(|reading| reading.date);
            let skip = tail.len().saturating_sub(count);
            for reading in tail.into_iter().skip(skip) {
                let _ = sink.send(TailEvent::Added(reading));
            }
        }
        drop(entries);

        let handle = self.allocate_handle();
        self.tails.lock().unwrap().insert(
            handle,
            TailSubscription {
                collection: collection.to_owned(),
                sink,
            },
        );
        Ok(handle)
    }

    fn subscribe_value(
        &self,
        path: &str,
        sink: Sender<ValueEvent>,
    ) -> Result<FeedHandle, StoreError> {
        if path != CONNECTED_PATH {
            return Err(StoreError::new(format!("unknown value path '{}'", path)));
        }
        let _ = sink.send(ValueEvent::Changed(self.connected.load(Ordering::SeqCst)));
        let handle = self.allocate_handle();
        self.values.lock().unwrap().insert(
            handle,
            ValueSubscription {
                path: path.to_owned(),
                sink,
            },
        );
        Ok(handle)
    }

    fn unsubscribe(&self, handle: FeedHandle) {
        self.tails.lock().unwrap().remove(&handle);
        self.values.lock().unwrap().remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn reading(date: i64) -> Bmp180Reading {
        Bmp180Reading::new(21, 101_325, 142, date)
    }

    #[test]
    fn append_notifies_tail_subscribers() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        store.subscribe_ordered_tail("bmp180", "date", 1, tx).unwrap();

        store.append("bmp180", &reading(100)).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            TailEvent::Added(reading(100))
        );
    }

    #[test]
    fn subscribe_replays_the_latest_entry() {
        let store = MemoryStore::new();
        store.append("bmp180", &reading(100)).unwrap();
        store.append("bmp180", &reading(200)).unwrap();

        let (tx, rx) = mpsc::channel();
        store.subscribe_ordered_tail("bmp180", "date", 1, tx).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            TailEvent::Added(reading(200))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        let handle = store.subscribe_ordered_tail("bmp180", "date", 1, tx).unwrap();
        store.unsubscribe(handle);

        store.append("bmp180", &reading(100)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn value_feed_delivers_current_flag_then_changes() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        store.subscribe_value(CONNECTED_PATH, tx).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            ValueEvent::Changed(true)
        );

        store.set_connected(false);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            ValueEvent::Changed(false)
        );
    }

    #[test]
    fn append_fails_while_disconnected() {
        let store = MemoryStore::new();
        store.set_connected(false);
        assert!(store.append("bmp180", &reading(100)).is_err());
    }

    #[test]
    fn rejects_unknown_order_field_and_value_path() {
        let store = MemoryStore::new();
        let (tail_tx, _tail_rx) = mpsc::channel();
        assert!(store
            .subscribe_ordered_tail("bmp180", "pressure", 1, tail_tx)
            .is_err());
        let (value_tx, _value_rx) = mpsc::channel();
        assert!(store.subscribe_value("somewhere/else", value_tx).is_err());
    }
}
