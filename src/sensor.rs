use crate::error::SensorError;
use log::info;

/// Synchronous access to one BMP180-class barometric sensor.
///
/// Reads may block on device I/O and may fail with an I/O-class fault. The
/// port is exclusively owned by the sampling flow; nobody else reads or
/// closes it.
pub trait Barometer: Send {
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    fn read_pressure(&mut self) -> Result<i32, SensorError>;

    fn read_altitude(&mut self) -> Result<f32, SensorError>;

    ///
    /// Releases the underlying device handle.
    ///
    fn close(&mut self) -> Result<(), SensorError>;
}

/// Deterministic stand-in for the real I2C driver: cyclic drift around fixed
/// base values, altitude derived through the barometric formula.
pub struct SimulatedBarometer {
    bus: String,
    step: u32,
}

impl SimulatedBarometer {
    const BASE_TEMPERATURE: f32 = 21.4;
    const BASE_PRESSURE: i32 = 101_325;

    pub fn open(bus: &str) -> Result<SimulatedBarometer, SensorError> {
        info!("Opening simulated BMP180 on {}", bus);
        Ok(SimulatedBarometer {
            bus: bus.to_owned(),
            step: 0,
        })
    }

    fn wobble(&mut self) -> i32 {
        self.step = self.step.wrapping_add(1);
        (self.step % 7) as i32 - 3
    }
}

impl Barometer for SimulatedBarometer {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        Ok(Self::BASE_TEMPERATURE + self.wobble() as f32 * 0.1)
    }

    fn read_pressure(&mut self) -> Result<i32, SensorError> {
        Ok(Self::BASE_PRESSURE + self.wobble() * 12)
    }

    fn read_altitude(&mut self) -> Result<f32, SensorError> {
        let pressure = Self::BASE_PRESSURE as f32 + self.wobble() as f32 * 12.0;
        Ok(44_330.0 * (1.0 - (pressure / 101_325.0).powf(1.0 / 5.255)))
    }

    fn close(&mut self) -> Result<(), SensorError> {
        info!("Closing simulated BMP180 on {}", self.bus);
        Ok(())
    }
}
