use serde::{Deserialize, Serialize};

use crate::types::AcMode;

pub const DEFAULT_FAN_SPEED: &str = "MED";

/// Inclusive temperature envelope, degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureBounds {
    pub min: i32,
    pub max: i32,
}

impl TemperatureBounds {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, temperature: i32) -> bool {
        (self.min..=self.max).contains(&temperature)
    }

    pub fn clamp(&self, temperature: i32) -> i32 {
        temperature.clamp(self.min, self.max)
    }

    pub fn sanitize(&mut self) {
        if self.min > self.max {
            std::mem::swap(&mut self.min, &mut self.max);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeBounds {
    pub heat: TemperatureBounds,
    pub cool: TemperatureBounds,
}

impl Default for ModeBounds {
    fn default() -> Self {
        Self {
            heat: TemperatureBounds::new(23, 23),
            cool: TemperatureBounds::new(19, 23),
        }
    }
}

impl ModeBounds {
    pub fn for_mode(&self, mode: AcMode) -> TemperatureBounds {
        match mode {
            AcMode::Heat => self.heat,
            AcMode::Cool => self.cool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub bounds: ModeBounds,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: String,
    #[serde(rename = "defaultMode")]
    pub default_mode: AcMode,
    #[serde(rename = "defaultTarget")]
    pub default_target: i32,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            bounds: ModeBounds::default(),
            fan_speed: DEFAULT_FAN_SPEED.to_string(),
            default_mode: AcMode::Heat,
            default_target: 23,
        }
    }
}

impl ClimateConfig {
    pub fn sanitize(&mut self) {
        self.bounds.heat.sanitize();
        self.bounds.cool.sanitize();

        self.fan_speed = normalize_fan_speed(&self.fan_speed);

        self.default_target = self
            .bounds
            .for_mode(self.default_mode)
            .clamp(self.default_target);
    }
}

/// Upper-cased single token; blank or multi-word values fall back to `MED`.
pub(crate) fn normalize_fan_speed(raw: &str) -> String {
    let fan_speed = raw.trim().to_ascii_uppercase();
    if fan_speed.is_empty() || fan_speed.contains(char::is_whitespace) {
        DEFAULT_FAN_SPEED.to_string()
    } else {
        fan_speed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrSendConfig {
    pub program: String,
    pub device: String,
    #[serde(rename = "minSendIntervalMs")]
    pub min_send_interval_ms: u64,
}

impl Default for IrSendConfig {
    fn default() -> Self {
        Self {
            program: "irsend".to_string(),
            device: "ac".to_string(),
            min_send_interval_ms: 300,
        }
    }
}

impl IrSendConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.program.trim().is_empty() {
            self.program = defaults.program;
        }
        if self.device.trim().is_empty() {
            self.device = defaults.device;
        }
        self.min_send_interval_ms = self.min_send_interval_ms.min(5_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl Default for AccessoryInfo {
    fn default() -> Self {
        Self {
            name: "Air Conditioner".to_string(),
            manufacturer: "AirConLircAccesoryManufacturer".to_string(),
            model: "AirConLircAccesoryModel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub climate: ClimateConfig,
    #[serde(default)]
    pub ir: IrSendConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub accessory: AccessoryInfo,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.climate.sanitize();
        self.ir.sanitize();
    }
}
