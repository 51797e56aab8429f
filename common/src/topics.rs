pub const TOPIC_CONTROLLER_STATE: &str = "aircon/controller/state";

pub const TOPIC_CMD_ACTIVE: &str = "aircon/cmnd/active";
pub const TOPIC_CMD_MODE: &str = "aircon/cmnd/mode";
pub const TOPIC_CMD_HEATING_THRESHOLD: &str = "aircon/cmnd/heating_threshold";
pub const TOPIC_CMD_COOLING_THRESHOLD: &str = "aircon/cmnd/cooling_threshold";
