use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Batch settings document saved by the reflectometry GUI.
///
/// Only the keys read by the reduction are modelled; everything else the GUI
/// writes is ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsDocument {
    #[serde(rename = "experimentView")]
    pub experiment: ExperimentSettings,
    #[serde(rename = "instrumentView")]
    pub instrument: InstrumentSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSettings {
    /// Raw combo-box code; decoded by `settings::AnalysisMode::from_code`.
    #[serde(rename = "analysisModeComboBox", default)]
    pub analysis_mode_code: Value,
    #[serde(rename = "perAngleDefaults")]
    pub per_angle_defaults: PerAngleDefaults,
    #[serde(rename = "startOverlapEdit")]
    pub start_overlap: f64,
    #[serde(rename = "endOverlapEdit")]
    pub end_overlap: f64,
    #[serde(rename = "transScaleRHSCheckBox")]
    pub scale_rhs_workspace: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerAngleDefaults {
    pub rows: Vec<OverrideRow>,
}

/// One row of the per-angle defaults table, stored as the GUI's string cells.
///
/// Field layout:
/// - 0: angle, or `""` for the default row
/// - 1, 2: first and second transmission run suffixes
/// - 3: transmission processing instructions
/// - 4..=7: reserved, not used by the reduction
/// - 8: processing instructions
/// - 9 onwards: reserved, not used by the reduction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideRow(pub Vec<String>);

impl OverrideRow {
    pub const ANGLE: usize = 0;
    pub const FIRST_TRANSMISSION_RUN: usize = 1;
    pub const SECOND_TRANSMISSION_RUN: usize = 2;
    pub const TRANSMISSION_PROCESSING_INSTRUCTIONS: usize = 3;
    pub const PROCESSING_INSTRUCTIONS: usize = 8;
    pub const MIN_FIELDS: usize = Self::PROCESSING_INSTRUCTIONS + 1;

    pub fn field(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn angle_text(&self) -> Option<&str> {
        self.field(Self::ANGLE)
    }

    pub fn is_default(&self) -> bool {
        self.angle_text() == Some("")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSettings {
    #[serde(rename = "monIntMinEdit")]
    pub monitor_integration_wavelength_min: f64,
    #[serde(rename = "monIntMaxEdit")]
    pub monitor_integration_wavelength_max: f64,
    #[serde(rename = "monBgMinEdit")]
    pub monitor_background_wavelength_min: f64,
    #[serde(rename = "monBgMaxEdit")]
    pub monitor_background_wavelength_max: f64,
    #[serde(rename = "lamMinEdit")]
    pub wavelength_min: f64,
    #[serde(rename = "lamMaxEdit")]
    pub wavelength_max: f64,
    #[serde(rename = "I0MonitorIndex")]
    pub i_zero_monitor_index: i64,
    /// Raw combo-box code; decoded by `settings::DetectorCorrectionType::from_code`.
    #[serde(rename = "detectorCorrectionTypeComboBox", default)]
    pub detector_correction_code: Value,
}

/// Flat parameter record handed to `ReflectometryISISLoadAndProcess`.
///
/// Serialized field names are the algorithm's property names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResolvedParameters {
    pub analysis_mode: String,
    pub first_transmission_run_list: String,
    pub second_transmission_run_list: String,
    pub transmission_processing_instructions: String,
    pub processing_instructions: String,
    pub start_overlap: f64,
    pub end_overlap: f64,
    #[serde(rename = "ScaleRHSWorkspace")]
    pub scale_rhs_workspace: bool,
    pub monitor_integration_wavelength_min: f64,
    pub monitor_integration_wavelength_max: f64,
    pub monitor_background_wavelength_min: f64,
    pub monitor_background_wavelength_max: f64,
    pub wavelength_min: f64,
    pub wavelength_max: f64,
    #[serde(rename = "I0MonitorIndex")]
    pub i_zero_monitor_index: i64,
    pub detector_correction_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunIdentity {
    pub instrument: String,
    pub run_number: String,
    pub run_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionOutputs {
    pub output_workspace: String,
    pub output_workspace_binned: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsProvenance {
    pub source_path: String,
    pub copied_to: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReductionRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub command: String,
    pub input_file: String,
    pub output_dir: String,
    pub run: RunIdentity,
    pub theta: f64,
    pub matched_row: String,
    pub settings: SettingsProvenance,
    pub parameters: ResolvedParameters,
    pub outputs: ReductionOutputs,
}
