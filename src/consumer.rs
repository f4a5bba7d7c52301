use crate::dto::Bmp180Reading;
use crate::error::StoreError;
use crate::monitor::{ConnectivityEvent, ConnectivityMonitor};
use crate::store::{spawn_relay, FeedHandle, TailEvent, TelemetryStore};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Pascals per millimetre of mercury, for the pressure label.
const PASCAL_TO_MM_HG: f64 = 133.322368;

/// Display-ready values for one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayValues {
    pub time_label: String,
    pub date_label: String,
    pub pressure_label: String,
    pub temperature_label: String,
}

impl DisplayValues {
    fn from_reading(reading: &Bmp180Reading) -> DisplayValues {
        let (time_label, date_label) = match Local.timestamp_millis_opt(reading.date).single() {
            Some(stamp) => clock_labels(&stamp),
            // a record with an unrepresentable date still renders
            None => ("-:--".to_owned(), "-/-/-".to_owned()),
        };
        DisplayValues {
            time_label,
            date_label,
            pressure_label: ((reading.pressure as f64 / PASCAL_TO_MM_HG).round() as i64)
                .to_string(),
            temperature_label: reading.temperature.to_string(),
        }
    }
}

fn clock_labels(stamp: &DateTime<Local>) -> (String, String) {
    (
        format!("{}:{:02}", stamp.hour(), stamp.minute()),
        format!("{}/{}/{}", stamp.year(), stamp.month(), stamp.day()),
    )
}

/// What the (external) presentation layer should currently be showing.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    Loading,
    Content(DisplayValues),
    Error(String),
}

enum ConsumerEvent {
    Tail(TailEvent),
    Connectivity(ConnectivityEvent),
}

impl From<TailEvent> for ConsumerEvent {
    fn from(event: TailEvent) -> ConsumerEvent {
        ConsumerEvent::Tail(event)
    }
}

impl From<ConnectivityEvent> for ConsumerEvent {
    fn from(event: ConnectivityEvent) -> ConsumerEvent {
        ConsumerEvent::Connectivity(event)
    }
}

/// Presents the single most recent reading and keeps it current.
///
/// Subscribes the store's ordered tail (one entry, newest by `date`) and the
/// connectivity notifications into one event loop. The loop trusts the order
/// the feed delivers in; an out-of-order or duplicate addition simply
/// re-renders with the received value.
pub struct LiveConsumer {
    store: Arc<dyn TelemetryStore>,
    tail_handle: Mutex<Option<FeedHandle>>,
    monitor: ConnectivityMonitor,
    torn_down: Arc<AtomicBool>,
}

impl LiveConsumer {
    pub fn start(
        store: Arc<dyn TelemetryStore>,
        collection: &str,
        order_field: &str,
        settle: Duration,
        display: Sender<DisplayState>,
    ) -> Result<LiveConsumer, StoreError> {
        let _ = display.send(DisplayState::Loading);
        let (events_tx, events_rx) = mpsc::channel();

        let (conn_tx, conn_rx) = mpsc::channel();
        let monitor = ConnectivityMonitor::start(store.clone(), settle, conn_tx);
        spawn_relay(conn_rx, events_tx.clone());

        let (tail_tx, tail_rx) = mpsc::channel();
        let tail_handle = match store.subscribe_ordered_tail(collection, order_field, 1, tail_tx) {
            Ok(handle) => handle,
            Err(e) => {
                // the watcher is already running and must not leak its feed
                monitor.shutdown();
                return Err(e);
            }
        };
        spawn_relay(tail_rx, events_tx);

        let torn_down = Arc::new(AtomicBool::new(false));
        let gate = torn_down.clone();
        thread::spawn(move || {
            for event in events_rx {
                if gate.load(Ordering::SeqCst) {
                    break;
                }
                let update = match event {
                    ConsumerEvent::Tail(TailEvent::Added(reading)) => Some(
                        DisplayState::Content(DisplayValues::from_reading(&reading)),
                    ),
                    // replays may reshuffle entries; only additions re-render
                    ConsumerEvent::Tail(TailEvent::Changed(_))
                    | ConsumerEvent::Tail(TailEvent::Moved(_))
                    | ConsumerEvent::Tail(TailEvent::Removed(_)) => None,
                    ConsumerEvent::Tail(TailEvent::Error(e)) => {
                        Some(DisplayState::Error(e.message))
                    }
                    ConsumerEvent::Connectivity(ConnectivityEvent::Checking) => {
                        Some(DisplayState::Loading)
                    }
                    ConsumerEvent::Connectivity(ConnectivityEvent::Connected) => None,
                    ConsumerEvent::Connectivity(ConnectivityEvent::Disconnected(cause)) => {
                        Some(DisplayState::Error(cause))
                    }
                };
                if let Some(state) = update {
                    if display.send(state).is_err() {
                        break;
                    }
                }
            }
            debug!("Display loop exited");
        });

        Ok(LiveConsumer {
            store,
            tail_handle: Mutex::new(Some(tail_handle)),
            monitor,
            torn_down,
        })
    }

    /// Manual re-check, e.g. from a tap on the error view.
    pub fn recheck(&self) {
        self.monitor.recheck();
    }

    /// Releases both feed registrations and ends the display loop. Safe to
    /// call at any time, from anywhere, any number of times.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.tail_handle.lock().unwrap().take() {
            self.store.unsubscribe(handle);
        }
        self.monitor.shutdown();
    }
}
