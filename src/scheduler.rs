use crate::dto::Bmp180Reading;
use crate::error::SensorError;
use crate::publisher::TelemetryPublisher;
use crate::sensor::Barometer;
use chrono::Utc;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Keeps sensor data flowing on a fixed cadence, forever.
///
/// One worker thread runs strictly sequential cycles: read, publish, wait.
/// A failed read is retried after the same fixed delay, with no attempt cap
/// and no backoff; unattended hardware must never give up. No timeout is
/// imposed on a read, so a hung driver call stalls the flow until it returns.
pub struct SamplingScheduler {
    stop_tx: Sender<()>,
    stopping: Arc<AtomicBool>,
}

impl SamplingScheduler {
    /// Spawns the sampling worker; the first cycle starts immediately. The
    /// worker takes exclusive ownership of the sensor and releases it when
    /// the loop exits, on every exit path.
    pub fn start(
        mut sensor: Box<dyn Barometer>,
        publisher: TelemetryPublisher,
        interval: Duration,
    ) -> SamplingScheduler {
        let (stop_tx, stop_rx) = mpsc::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = stopping.clone();
        thread::spawn(move || {
            info!("Sampling every {:?}", interval);
            loop {
                match snapshot(sensor.as_mut()) {
                    Ok(reading) => {
                        // a stop that landed while the read was in flight
                        // drops the result
                        if flag.load(Ordering::SeqCst) {
                            debug!("Dropping reading taken while stopping");
                            break;
                        }
                        publisher.publish(&reading);
                    }
                    Err(e) => error!("Can't read data from sensor: {}", e),
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => (),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            if let Err(e) = sensor.close() {
                error!("Closing sensor failed: {}", e);
            }
            debug!("Sampling worker exited");
        });
        SamplingScheduler { stop_tx, stopping }
    }

    /// Cancels the pending wait and prevents further cycles. A read already
    /// in flight finishes on its own and its result is dropped. Terminal;
    /// construct a new scheduler to sample again.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(());
        info!("Sampling scheduler stopped");
    }
}

fn snapshot(sensor: &mut dyn Barometer) -> Result<Bmp180Reading, SensorError> {
    let temperature = sensor.read_temperature()?;
    let pressure = sensor.read_pressure()?;
    let altitude = sensor.read_altitude()?;
    Ok(Bmp180Reading::new(
        temperature as i32,
        pressure,
        altitude as i32,
        Utc::now().timestamp_millis(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TailEvent, TelemetryStore};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::Receiver;

    struct ScriptedBarometer {
        remaining_failures: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl Barometer for ScriptedBarometer {
        fn read_temperature(&mut self) -> Result<f32, SensorError> {
            let left = self.remaining_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining_failures.store(left - 1, Ordering::SeqCst);
                Err(SensorError::new("I2C transaction failed"))
            } else {
                Ok(21.4)
            }
        }

        fn read_pressure(&mut self) -> Result<i32, SensorError> {
            Ok(101_325)
        }

        fn read_altitude(&mut self) -> Result<f32, SensorError> {
            Ok(142.0)
        }

        fn close(&mut self) -> Result<(), SensorError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pipeline(
        failures: usize,
    ) -> (
        SamplingScheduler,
        Receiver<TailEvent>,
        Arc<AtomicUsize>,
        Arc<AtomicBool>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let (tail_tx, tail_rx) = mpsc::channel();
        store
            .subscribe_ordered_tail("bmp180", "date", 1, tail_tx)
            .unwrap();
        let remaining_failures = Arc::new(AtomicUsize::new(failures));
        let closed = Arc::new(AtomicBool::new(false));
        let sensor = ScriptedBarometer {
            remaining_failures: remaining_failures.clone(),
            closed: closed.clone(),
        };
        let publisher = TelemetryPublisher::new(store, "bmp180");
        let scheduler = SamplingScheduler::start(
            Box::new(sensor),
            publisher,
            Duration::from_millis(20),
        );
        (scheduler, tail_rx, remaining_failures, closed)
    }

    fn await_flag(flag: &AtomicBool) {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("flag never set");
    }

    #[test]
    fn resumes_after_sensor_faults() {
        let (scheduler, tail_rx, remaining_failures, _) = pipeline(2);

        // the two failing cycles publish nothing, then readings flow again
        let first = tail_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, TailEvent::Added(_)));
        assert_eq!(remaining_failures.load(Ordering::SeqCst), 0);
        scheduler.stop();
    }

    #[test]
    fn timestamps_never_decrease() {
        let (scheduler, tail_rx, _, _) = pipeline(0);

        let mut last = i64::MIN;
        for _ in 0..3 {
            match tail_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                TailEvent::Added(reading) => {
                    assert!(reading.date >= last);
                    last = reading.date;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        scheduler.stop();
    }

    #[test]
    fn stop_prevents_further_cycles_and_releases_the_sensor() {
        let (scheduler, tail_rx, _, closed) = pipeline(0);

        tail_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        scheduler.stop();
        scheduler.stop(); // second call is a no-op

        await_flag(&closed);
        // drain anything that raced the stop, then expect silence
        while tail_rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(100));
        assert!(tail_rx.try_recv().is_err());
    }
}
