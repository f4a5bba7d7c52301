use crate::store::{spawn_relay, TelemetryStore, ValueEvent, CONNECTED_PATH};
use log::debug;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Connectivity transitions raised towards the observer flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivityEvent {
    Checking,
    Connected,
    Disconnected(String),
}

enum MonitorMsg {
    Value(ValueEvent),
    Recheck,
    Shutdown,
}

impl From<ValueEvent> for MonitorMsg {
    fn from(event: ValueEvent) -> MonitorMsg {
        MonitorMsg::Value(event)
    }
}

/// Watches the store's connectivity flag.
///
/// A fresh check waits out the settle delay before trusting the flag once;
/// brief blips inside that window never reach the consumer. Push updates
/// arriving through the established feed are applied without the delay.
pub struct ConnectivityMonitor {
    cmd_tx: Sender<MonitorMsg>,
}

impl ConnectivityMonitor {
    pub fn start(
        store: Arc<dyn TelemetryStore>,
        settle: Duration,
        notify: Sender<ConnectivityEvent>,
    ) -> ConnectivityMonitor {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let feed_tx = cmd_tx.clone();
        thread::spawn(move || {
            'check: loop {
                let _ = notify.send(ConnectivityEvent::Checking);
                // settle before trusting the flag
                loop {
                    match cmd_rx.recv_timeout(settle) {
                        Err(RecvTimeoutError::Timeout) => break,
                        Ok(MonitorMsg::Recheck) => continue 'check,
                        // stale event from a released feed
                        Ok(MonitorMsg::Value(_)) => (),
                        Ok(MonitorMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                            debug!("Connectivity watcher exited");
                            return;
                        }
                    }
                }
                let (value_tx, value_rx) = mpsc::channel();
                let handle = match store.subscribe_value(CONNECTED_PATH, value_tx) {
                    Ok(handle) => handle,
                    Err(e) => {
                        let _ = notify.send(ConnectivityEvent::Disconnected(e.message));
                        // nothing to watch; wait for a manual re-check
                        loop {
                            match cmd_rx.recv() {
                                Ok(MonitorMsg::Recheck) => continue 'check,
                                Ok(MonitorMsg::Value(_)) => (),
                                Ok(MonitorMsg::Shutdown) | Err(_) => {
                                    debug!("Connectivity watcher exited");
                                    return;
                                }
                            }
                        }
                    }
                };
                spawn_relay(value_rx, feed_tx.clone());
                // the feed pushes from here on; no settle for those updates
                loop {
                    match cmd_rx.recv() {
                        Ok(MonitorMsg::Value(ValueEvent::Changed(true))) => {
                            let _ = notify.send(ConnectivityEvent::Connected);
                        }
                        Ok(MonitorMsg::Value(ValueEvent::Changed(false))) => {
                            let _ = notify.send(ConnectivityEvent::Disconnected(
                                "telemetry store is unreachable".to_owned(),
                            ));
                        }
                        Ok(MonitorMsg::Value(ValueEvent::Cancelled(e))) => {
                            let _ = notify.send(ConnectivityEvent::Disconnected(e.message));
                        }
                        Ok(MonitorMsg::Recheck) => {
                            store.unsubscribe(handle);
                            continue 'check;
                        }
                        Ok(MonitorMsg::Shutdown) | Err(_) => {
                            store.unsubscribe(handle);
                            debug!("Connectivity watcher exited");
                            return;
                        }
                    }
                }
            }
        });
        ConnectivityMonitor { cmd_tx }
    }

    /// Re-enters the checking phase, settle delay included.
    pub fn recheck(&self) {
        let _ = self.cmd_tx.send(MonitorMsg::Recheck);
    }

    /// Releases the value feed and ends the watcher. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(MonitorMsg::Shutdown);
    }
}
