use barolog::config::read_config;
use barolog::consumer::LiveConsumer;
use barolog::publisher::TelemetryPublisher;
use barolog::scheduler::SamplingScheduler;
use barolog::sensor::SimulatedBarometer;
use barolog::store::MemoryStore;
use clap::{App, Arg};
use log::info;
use std::fs::File;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let matches = App::new("barolog")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Relays BMP180 readings into a telemetry store and mirrors the latest entry")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .takes_value(true)
                .default_value("config.toml"),
        )
        .arg(
            Arg::with_name("logging")
                .short("l")
                .long("logging-config")
                .value_name("FILE")
                .help("log4rs configuration file")
                .takes_value(true)
                .default_value("logging.yml"),
        )
        .get_matches();

    log4rs::init_file(matches.value_of("logging").unwrap(), Default::default()).unwrap();
    info!("Loading configuration");
    let f = File::open(matches.value_of("config").unwrap()).unwrap();
    let settings = read_config(f).unwrap();

    info!("Starting barolog");
    let store = Arc::new(MemoryStore::new());

    let sensor = SimulatedBarometer::open(&settings.sensor.i2c_bus).unwrap();
    let publisher = TelemetryPublisher::new(store.clone(), &settings.store.collection);
    let _scheduler = SamplingScheduler::start(
        Box::new(sensor),
        publisher,
        Duration::from_secs(settings.sampling.interval_secs),
    );

    let (display_tx, display_rx) = channel();
    let _consumer = LiveConsumer::start(
        store.clone(),
        &settings.store.collection,
        &settings.store.order_field,
        Duration::from_millis(settings.display.settle_delay_ms),
        display_tx,
    )
    .unwrap();

    // stand-in for the excluded presentation layer
    for state in display_rx {
        info!("Display: {:?}", state);
    }
}
