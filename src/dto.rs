use serde::{Deserialize, Serialize};

/// One atomic snapshot of the BMP180, as persisted in the `bmp180` collection.
///
/// Entries are ordered by `date` (epoch milliseconds, assigned when the
/// snapshot is taken) and immutable once appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bmp180Reading {
    pub temperature: i32,
    pub pressure: i32,
    pub altitude: i32,
    pub date: i64,
}

impl Bmp180Reading {
    pub fn new(temperature: i32, pressure: i32, altitude: i32, date: i64) -> Bmp180Reading {
        Bmp180Reading {
            temperature,
            pressure,
            altitude,
            date,
        }
    }
}
