pub mod config;
pub mod controller;
pub mod encoder;
pub mod topics;
pub mod transmit;
pub mod types;

pub use config::{
    AccessoryInfo, ClimateConfig, IrSendConfig, ModeBounds, NetworkConfig, RuntimeConfig,
    TemperatureBounds,
};
pub use controller::{ClimateController, ControllerError};
pub use encoder::{CommandEncoder, EncodeError};
pub use topics::*;
pub use transmit::Transmitter;
pub use types::{
    AccessoryStatus, AcMode, AppliedState, Command, ControllerStatePayload, DeviceState, Intent,
    TargetMode,
};
