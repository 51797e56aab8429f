use thiserror::Error;

use crate::{
    config::{AccessoryInfo, ClimateConfig, ModeBounds},
    encoder::{CommandEncoder, EncodeError},
    transmit::Transmitter,
    types::{
        AccessoryStatus, AcMode, AppliedState, ControllerStatePayload, DeviceState, Intent,
        TargetMode,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Owns the mirrored device state and is the only place it changes.
///
/// Every operation runs clamp, encode, transmit and commit in that order, so a
/// command is never derived from a state that violates the configured bounds.
/// Not synchronized: callers sharing one controller must serialize access.
#[derive(Debug, Clone)]
pub struct ClimateController<T> {
    bounds: ModeBounds,
    encoder: CommandEncoder,
    state: DeviceState,
    transmitter: T,
}

impl<T: Transmitter> ClimateController<T> {
    pub fn new(mut config: ClimateConfig, transmitter: T) -> Self {
        config.sanitize();
        Self {
            bounds: config.bounds,
            encoder: CommandEncoder::new(config.fan_speed),
            state: DeviceState {
                active: false,
                mode: config.default_mode,
                target_temperature: config.default_target,
            },
            transmitter,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn bounds(&self) -> &ModeBounds {
        &self.bounds
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn apply(&mut self, intent: Intent) -> Result<AppliedState, ControllerError> {
        match intent {
            Intent::PowerOn => self.set_active(true).map(AppliedState::Active),
            Intent::PowerOff => self.set_active(false).map(AppliedState::Active),
            Intent::SetMode(requested) => {
                let (mode, target_temperature) = self.set_mode(requested)?;
                Ok(AppliedState::Mode {
                    mode,
                    target_temperature,
                })
            }
            Intent::SetTargetTemperature(mode, requested) => self
                .set_target_temperature(mode, requested)
                .map(AppliedState::TargetTemperature),
        }
    }

    /// Powering off keeps the stored mode and setpoint for the next power-on.
    pub fn set_active(&mut self, desired: bool) -> Result<bool, ControllerError> {
        let command = if desired {
            self.encoder
                .encode_setpoint(self.state.mode.into(), self.state.target_temperature)?
        } else {
            self.encoder.encode_power_off()
        };

        self.transmitter.transmit(&command);
        self.state.active = desired;
        Ok(self.state.active)
    }

    /// `Auto` leaves the state untouched and sends nothing. A setpoint that
    /// falls outside the new mode's envelope is reset to that mode's minimum.
    /// Nothing is transmitted while the unit is off.
    pub fn set_mode(&mut self, requested: TargetMode) -> Result<(AcMode, i32), ControllerError> {
        let Some(mode) = requested.resolved() else {
            return Ok((self.state.mode, self.state.target_temperature));
        };

        let bounds = self.bounds.for_mode(mode);
        let target = if bounds.contains(self.state.target_temperature) {
            self.state.target_temperature
        } else {
            bounds.min
        };

        if self.state.active {
            let command = self.encoder.encode_setpoint(mode.into(), target)?;
            self.transmitter.transmit(&command);
        }

        self.state.mode = mode;
        self.state.target_temperature = target;
        Ok((self.state.mode, self.state.target_temperature))
    }

    /// Setting a mode's threshold also selects that mode. Transmits even while
    /// the unit is off; power gating belongs to the caller.
    pub fn set_target_temperature(
        &mut self,
        mode: AcMode,
        requested: i32,
    ) -> Result<i32, ControllerError> {
        let target = self.bounds.for_mode(mode).clamp(requested);
        let command = self.encoder.encode_setpoint(mode.into(), target)?;

        self.transmitter.transmit(&command);
        self.state.mode = mode;
        self.state.target_temperature = target;
        Ok(self.state.target_temperature)
    }

    pub fn status(&self, info: &AccessoryInfo) -> AccessoryStatus {
        AccessoryStatus {
            name: info.name.clone(),
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            active: self.state.active,
            current_heater_cooler_state: self.state.mode.current_state_code(),
            target_heater_cooler_state: TargetMode::from(self.state.mode).code(),
            mode: self.state.mode.as_str(),
            current_temperature: self
                .state
                .active
                .then_some(self.state.target_temperature),
            heating_threshold_temperature: self.state.target_temperature,
            cooling_threshold_temperature: self.state.target_temperature,
            temperature_display_units: "CELSIUS",
        }
    }

    pub fn state_payload(&self) -> ControllerStatePayload {
        ControllerStatePayload {
            active: self.state.active,
            mode: self.state.mode.as_str(),
            target: self.state.target_temperature,
        }
    }
}
