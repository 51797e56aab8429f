use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating regime the unit can actually be driven into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcMode {
    Heat,
    Cool,
}

impl AcMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }

    /// HomeKit CurrentHeaterCoolerState reflection (`HEATING = 2`, `COOLING = 3`).
    pub fn current_state_code(self) -> u8 {
        TargetMode::from(self).code() + 1
    }
}

/// Mode selection as the platform advertises it. `Auto` exists on the wire but
/// is never stored as a device mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetMode {
    Auto,
    Heat,
    Cool,
}

impl TargetMode {
    /// Lowest selectable code; `Auto` sits below it.
    pub const MIN_SELECTABLE_CODE: u8 = 1;
    pub const MAX_SELECTABLE_CODE: u8 = 2;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Heat => 1,
            Self::Cool => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Auto),
            1 => Some(Self::Heat),
            2 => Some(Self::Cool),
            _ => None,
        }
    }

    /// Accepts either the mode name (any case) or its numeric code.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(code) = value.parse::<u8>() {
            return Self::from_code(code);
        }
        match value.to_ascii_uppercase().as_str() {
            "AUTO" => Some(Self::Auto),
            "HEAT" => Some(Self::Heat),
            "COOL" => Some(Self::Cool),
            _ => None,
        }
    }

    pub fn resolved(self) -> Option<AcMode> {
        match self {
            Self::Auto => None,
            Self::Heat => Some(AcMode::Heat),
            Self::Cool => Some(AcMode::Cool),
        }
    }
}

impl From<AcMode> for TargetMode {
    fn from(mode: AcMode) -> Self {
        match mode {
            AcMode::Heat => Self::Heat,
            AcMode::Cool => Self::Cool,
        }
    }
}

/// Encoded IR command as understood by the transmission tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    pub(crate) fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub active: bool,
    pub mode: AcMode,
    #[serde(rename = "targetTemperature")]
    pub target_temperature: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PowerOff,
    PowerOn,
    SetMode(TargetMode),
    SetTargetTemperature(AcMode, i32),
}

/// What an intent ended up applying, after correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedState {
    Active(bool),
    Mode { mode: AcMode, target_temperature: i32 },
    TargetTemperature(i32),
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessoryStatus {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub active: bool,
    #[serde(rename = "currentHeaterCoolerState")]
    pub current_heater_cooler_state: u8,
    #[serde(rename = "targetHeaterCoolerState")]
    pub target_heater_cooler_state: u8,
    pub mode: &'static str,
    #[serde(rename = "currentTemperature")]
    pub current_temperature: Option<i32>,
    #[serde(rename = "heatingThresholdTemperature")]
    pub heating_threshold_temperature: i32,
    #[serde(rename = "coolingThresholdTemperature")]
    pub cooling_threshold_temperature: i32,
    #[serde(rename = "temperatureDisplayUnits")]
    pub temperature_display_units: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatePayload {
    pub active: bool,
    pub mode: &'static str,
    pub target: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_mode_parses_names_and_codes() {
        assert_eq!(TargetMode::parse("heat"), Some(TargetMode::Heat));
        assert_eq!(TargetMode::parse(" COOL "), Some(TargetMode::Cool));
        assert_eq!(TargetMode::parse("0"), Some(TargetMode::Auto));
        assert_eq!(TargetMode::parse("2"), Some(TargetMode::Cool));
        assert_eq!(TargetMode::parse("3"), None);
        assert_eq!(TargetMode::parse("fan"), None);
    }

    #[test]
    fn auto_has_no_device_mode() {
        assert_eq!(TargetMode::Auto.resolved(), None);
        assert_eq!(TargetMode::Cool.resolved(), Some(AcMode::Cool));
        assert_eq!(TargetMode::from(AcMode::Heat).code(), 1);
    }

    #[test]
    fn current_state_codes_follow_heater_cooler_numbering() {
        assert_eq!(AcMode::Heat.current_state_code(), 2);
        assert_eq!(AcMode::Cool.current_state_code(), 3);
    }
}
