use thiserror::Error;

use crate::{
    config::{normalize_fan_speed, DEFAULT_FAN_SPEED},
    types::{Command, TargetMode},
};

pub const POWER_OFF_COMMAND: &str = "OFF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("mode {} cannot be encoded as a setpoint", .0.as_str())]
    InvalidMode(TargetMode),
}

/// Maps validated device state onto the command names known to the IR tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEncoder {
    fan_speed: String,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FAN_SPEED)
    }
}

impl CommandEncoder {
    /// The fan-speed literal is normalized the same way the config layer does.
    pub fn new(fan_speed: impl AsRef<str>) -> Self {
        Self {
            fan_speed: normalize_fan_speed(fan_speed.as_ref()),
        }
    }

    pub fn fan_speed(&self) -> &str {
        &self.fan_speed
    }

    pub fn encode_power_off(&self) -> Command {
        Command::new(POWER_OFF_COMMAND.to_string())
    }

    /// `<MODE>_<TEMPERATURE>_<FANSPEED>`, e.g. `HEAT_23_MED`.
    pub fn encode_setpoint(
        &self,
        mode: TargetMode,
        temperature: i32,
    ) -> Result<Command, EncodeError> {
        let mode = mode.resolved().ok_or(EncodeError::InvalidMode(mode))?;
        Ok(Command::new(format!(
            "{}_{}_{}",
            mode.as_str(),
            temperature,
            self.fan_speed
        )))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn setpoint_table() {
        let encoder = CommandEncoder::default();
        let cases = [
            (TargetMode::Heat, 23, "HEAT_23_MED"),
            (TargetMode::Cool, 19, "COOL_19_MED"),
            (TargetMode::Cool, 23, "COOL_23_MED"),
            (TargetMode::Heat, -5, "HEAT_-5_MED"),
        ];

        for (mode, temperature, expected) in cases {
            let command = encoder.encode_setpoint(mode, temperature).unwrap();
            assert_eq!(command.as_str(), expected);
        }
    }

    #[test]
    fn power_off_is_fixed_literal() {
        let encoder = CommandEncoder::new("HIGH");
        assert_eq!(encoder.encode_power_off().as_str(), "OFF");
    }

    #[test]
    fn auto_is_rejected() {
        let encoder = CommandEncoder::default();
        assert_eq!(
            encoder.encode_setpoint(TargetMode::Auto, 23),
            Err(EncodeError::InvalidMode(TargetMode::Auto))
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = CommandEncoder::default();
        let first = encoder.encode_setpoint(TargetMode::Cool, 21).unwrap();
        for _ in 0..10 {
            assert_eq!(encoder.encode_setpoint(TargetMode::Cool, 21).unwrap(), first);
        }
        assert_eq!(first.to_string(), "COOL_21_MED");
    }

    #[test]
    fn blank_or_lowercase_fan_speed_is_normalized() {
        assert_eq!(
            CommandEncoder::new("").encode_setpoint(TargetMode::Heat, 23).unwrap().as_str(),
            "HEAT_23_MED"
        );
        assert_eq!(
            CommandEncoder::new(" low ").encode_setpoint(TargetMode::Cool, 20).unwrap().as_str(),
            "COOL_20_LOW"
        );
        assert_eq!(CommandEncoder::new("very high").fan_speed(), DEFAULT_FAN_SPEED);
    }

    #[test]
    fn fan_speed_literal_is_configurable() {
        let encoder = CommandEncoder::new("LOW");
        assert_eq!(
            encoder.encode_setpoint(TargetMode::Heat, 22).unwrap().as_str(),
            "HEAT_22_LOW"
        );
    }
}
