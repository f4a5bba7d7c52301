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

use crate::error::ConfigError;
use serde::Deserialize;
use std::io::Read;

#[derive(Deserialize)]
pub struct Settings {
    pub sensor: Sensor,
    pub sampling: Sampling,
    pub store: Store,
    pub display: Display,
}

#[derive(Deserialize)]
pub struct Sensor {
    pub i2c_bus: String,
}

#[derive(Deserialize)]
pub struct Sampling {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Deserialize)]
pub struct Store {
    pub collection: String,
    pub order_field: String,
}

#[derive(Deserialize)]
pub struct Display {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_interval_secs() -> u64 {
    600
}

fn default_settle_delay_ms() -> u64 {
    2000
}

pub fn read_config<T: Read + Sized>(mut f: T) -> Result<Settings, ConfigError> {
    let mut buffer = String::new();
    f.read_to_string(&mut buffer).map_err(ConfigError::Io)?;
    toml::from_str(&buffer).map_err(ConfigError::Parse)
}
