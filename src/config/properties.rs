use serde::Deserialize;

/// OOI entity type property ids the indicators read and write.
///
/// These are deployment specific: they must match the entity type
/// properties defined in the OOI-WSR instance the world-states live in.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PropertyIds {
    #[serde(default = "default_patient_life")]
    pub patient_life: u64,
    #[serde(default = "default_patient_exposed")]
    pub patient_exposed: u64,
    #[serde(default = "default_patient_treatment_state")]
    pub patient_treatment_state: u64,
    #[serde(default = "default_vehicle_resource_command")]
    pub vehicle_resource_command: u64,
    #[serde(default = "default_vehicle_availability")]
    pub vehicle_availability: u64,
    #[serde(default = "default_vehicle_capacity")]
    pub vehicle_capacity: u64,
    #[serde(default = "default_vehicle_display_state")]
    pub vehicle_display_state: u64,
    /// Indicator property the `lifeIndicator` histogram is mirrored into.
    #[serde(default = "default_life_indicator")]
    pub life_indicator: u64,
    /// Indicator property the `deathsIndicator` count is mirrored into.
    #[serde(default = "default_deaths_indicator")]
    pub deaths_indicator: u64,
    #[serde(default = "default_improved_indicator")]
    pub improved_indicator: u64,
}

fn default_patient_life() -> u64 {
    42
}

fn default_patient_exposed() -> u64 {
    54
}

fn default_patient_treatment_state() -> u64 {
    52
}

fn default_vehicle_resource_command() -> u64 {
    45
}

fn default_vehicle_availability() -> u64 {
    46
}

fn default_vehicle_capacity() -> u64 {
    47
}

fn default_vehicle_display_state() -> u64 {
    48
}

fn default_life_indicator() -> u64 {
    60
}

fn default_deaths_indicator() -> u64 {
    61
}

fn default_improved_indicator() -> u64 {
    63
}

impl Default for PropertyIds {
    fn default() -> Self {
        Self {
            patient_life: default_patient_life(),
            patient_exposed: default_patient_exposed(),
            patient_treatment_state: default_patient_treatment_state(),
            vehicle_resource_command: default_vehicle_resource_command(),
            vehicle_availability: default_vehicle_availability(),
            vehicle_capacity: default_vehicle_capacity(),
            vehicle_display_state: default_vehicle_display_state(),
            life_indicator: default_life_indicator(),
            deaths_indicator: default_deaths_indicator(),
            improved_indicator: default_improved_indicator(),
        }
    }
}
