use serde_json::Value;

use crate::error::ReductionError;
use crate::model::{OverrideRow, ResolvedParameters, SettingsDocument};

/// Lower and upper factors of the +/-0.5% angle match window.
pub const WINDOW_LOWER_FACTOR: f64 = 0.995;
pub const WINDOW_UPPER_FACTOR: f64 = 1.005;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnalysisMode {
    MultiDetector,
    PointDetector,
}

impl AnalysisMode {
    pub fn from_code(code: &Value) -> Result<Self, ReductionError> {
        match code.as_i64() {
            Some(1) => Ok(Self::MultiDetector),
            Some(0) => Ok(Self::PointDetector),
            _ => Err(ReductionError::InvalidCode {
                field: "analysisModeComboBox",
                value: code.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultiDetector => "MultiDetectorAnalysis",
            Self::PointDetector => "PointDetectorAnalysis",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectorCorrectionType {
    RotateAroundSample,
    VerticalShift,
}

impl DetectorCorrectionType {
    pub fn from_code(code: &Value) -> Result<Self, ReductionError> {
        match code.as_i64() {
            Some(1) => Ok(Self::RotateAroundSample),
            Some(0) => Ok(Self::VerticalShift),
            _ => Err(ReductionError::InvalidCode {
                field: "detectorCorrectionTypeComboBox",
                value: code.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RotateAroundSample => "RotateAroundSample",
            Self::VerticalShift => "VerticalShift",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchKind {
    Angle,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct RowMatch<'a> {
    pub index: usize,
    pub kind: MatchKind,
    pub row: &'a OverrideRow,
}

impl RowMatch<'_> {
    pub fn describe(&self) -> String {
        match self.kind {
            MatchKind::Angle => format!(
                "row {} (angle {})",
                self.index,
                self.row.angle_text().unwrap_or_default()
            ),
            MatchKind::Default => format!("row {} (default)", self.index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsResolution {
    pub parameters: ResolvedParameters,
    pub matched_row: String,
    pub match_kind: MatchKind,
}

/// Inclusive `[angle * 0.995, angle * 1.005]` window.
pub fn match_window(angle: f64) -> (f64, f64) {
    (angle * WINDOW_LOWER_FACTOR, angle * WINDOW_UPPER_FACTOR)
}

/// Two-pass row scan: the first row whose angle falls inside the window,
/// otherwise the first default (`""`) row.
///
/// Default rows are skipped during the angle pass. Ties between overlapping
/// windows go to the earlier row.
pub fn select_row(rows: &[OverrideRow], angle: f64) -> Result<Option<RowMatch<'_>>, ReductionError> {
    let (min, max) = match_window(angle);

    for (index, row) in rows.iter().enumerate() {
        let text = row.angle_text().ok_or_else(|| ReductionError::MalformedRow {
            index,
            reason: "row has no angle field".to_string(),
        })?;
        if text.is_empty() {
            continue;
        }

        let row_angle = text
            .trim()
            .parse::<f64>()
            .map_err(|_| ReductionError::MalformedRow {
                index,
                reason: format!("angle field is not a number: {text:?}"),
            })?;

        if min <= row_angle && row_angle <= max {
            return Ok(Some(RowMatch {
                index,
                kind: MatchKind::Angle,
                row,
            }));
        }
    }

    Ok(rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.is_default())
        .map(|(index, row)| RowMatch {
            index,
            kind: MatchKind::Default,
            row,
        }))
}

pub fn resolve_settings(
    document: &SettingsDocument,
    angle: f64,
    instrument: &str,
) -> Result<SettingsResolution, ReductionError> {
    let experiment = &document.experiment;
    let analysis_mode = AnalysisMode::from_code(&experiment.analysis_mode_code)?;

    let matched = select_row(&experiment.per_angle_defaults.rows, angle)?
        .ok_or(ReductionError::NoApplicableSettings { angle })?;
    let row = matched.row;
    if row.0.len() < OverrideRow::MIN_FIELDS {
        return Err(ReductionError::MalformedRow {
            index: matched.index,
            reason: format!(
                "expected at least {} fields, found {}",
                OverrideRow::MIN_FIELDS,
                row.0.len()
            ),
        });
    }
    let field = |index: usize| row.field(index).unwrap_or_default().to_string();

    let instrument_settings = &document.instrument;
    let detector_correction =
        DetectorCorrectionType::from_code(&instrument_settings.detector_correction_code)?;

    let parameters = ResolvedParameters {
        analysis_mode: analysis_mode.as_str().to_string(),
        first_transmission_run_list: format!(
            "{instrument}{}",
            field(OverrideRow::FIRST_TRANSMISSION_RUN)
        ),
        second_transmission_run_list: format!(
            "{instrument}{}",
            field(OverrideRow::SECOND_TRANSMISSION_RUN)
        ),
        transmission_processing_instructions: field(
            OverrideRow::TRANSMISSION_PROCESSING_INSTRUCTIONS,
        ),
        processing_instructions: field(OverrideRow::PROCESSING_INSTRUCTIONS),
        start_overlap: experiment.start_overlap,
        end_overlap: experiment.end_overlap,
        scale_rhs_workspace: experiment.scale_rhs_workspace,
        monitor_integration_wavelength_min: instrument_settings.monitor_integration_wavelength_min,
        monitor_integration_wavelength_max: instrument_settings.monitor_integration_wavelength_max,
        monitor_background_wavelength_min: instrument_settings.monitor_background_wavelength_min,
        monitor_background_wavelength_max: instrument_settings.monitor_background_wavelength_max,
        wavelength_min: instrument_settings.wavelength_min,
        wavelength_max: instrument_settings.wavelength_max,
        i_zero_monitor_index: instrument_settings.i_zero_monitor_index,
        detector_correction_type: detector_correction.as_str().to_string(),
    };

    Ok(SettingsResolution {
        parameters,
        matched_row: matched.describe(),
        match_kind: matched.kind,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(angle: &str, first: &str, second: &str) -> Vec<String> {
        vec![
            angle.to_string(),
            first.to_string(),
            second.to_string(),
            "4".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            format!("{angle}-detectors"),
        ]
    }

    fn document(rows: Vec<Vec<String>>, analysis: Value, correction: Value) -> SettingsDocument {
        let raw = json!({
            "experimentView": {
                "analysisModeComboBox": analysis,
                "perAngleDefaults": { "rows": rows },
                "startOverlapEdit": 10.0,
                "endOverlapEdit": 12.0,
                "transScaleRHSCheckBox": true,
                "polCorrComboBox": 0
            },
            "instrumentView": {
                "monIntMinEdit": 4.0,
                "monIntMaxEdit": 10.0,
                "monBgMinEdit": 17.0,
                "monBgMaxEdit": 18.0,
                "lamMinEdit": 1.5,
                "lamMaxEdit": 17.0,
                "I0MonitorIndex": 2,
                "detectorCorrectionTypeComboBox": correction
            }
        });
        serde_json::from_value(raw).expect("fixture should deserialize")
    }

    fn standard_rows() -> Vec<Vec<String>> {
        vec![
            row("0.7", "13463", "13464"),
            row("2.3", "13469", "13470"),
            row("", "13460", "13461"),
        ]
    }

    #[test]
    fn analysis_mode_codes_decode_to_algorithm_strings() {
        assert_eq!(
            AnalysisMode::from_code(&json!(1)).map(AnalysisMode::as_str).ok(),
            Some("MultiDetectorAnalysis")
        );
        assert_eq!(
            AnalysisMode::from_code(&json!(0)).map(AnalysisMode::as_str).ok(),
            Some("PointDetectorAnalysis")
        );
        for invalid in [json!(2), json!(-1), Value::Null] {
            let err = AnalysisMode::from_code(&invalid).unwrap_err();
            assert!(matches!(
                err,
                ReductionError::InvalidCode {
                    field: "analysisModeComboBox",
                    ..
                }
            ));
        }
    }

    #[test]
    fn detector_correction_codes_decode_to_algorithm_strings() {
        assert_eq!(
            DetectorCorrectionType::from_code(&json!(1))
                .map(DetectorCorrectionType::as_str)
                .ok(),
            Some("RotateAroundSample")
        );
        assert_eq!(
            DetectorCorrectionType::from_code(&json!(0))
                .map(DetectorCorrectionType::as_str)
                .ok(),
            Some("VerticalShift")
        );
        for invalid in [json!(2), json!(-1), Value::Null, json!("1")] {
            assert!(DetectorCorrectionType::from_code(&invalid).is_err());
        }
    }

    #[test]
    fn angle_within_half_percent_selects_row() {
        let doc = document(vec![row("10.0", "1", "2")], json!(1), json!(1));

        let resolved = resolve_settings(&doc, 10.04, "INTER").expect("10.04 is within tolerance");
        assert_eq!(resolved.match_kind, MatchKind::Angle);
        assert_eq!(resolved.parameters.first_transmission_run_list, "INTER1");

        let resolved = resolve_settings(&doc, 9.96, "INTER").expect("9.96 is within tolerance");
        assert_eq!(resolved.match_kind, MatchKind::Angle);
    }

    #[test]
    fn angle_outside_tolerance_without_default_fails() {
        let doc = document(vec![row("10.0", "1", "2")], json!(1), json!(1));

        let err = resolve_settings(&doc, 10.06, "INTER").unwrap_err();
        assert!(matches!(err, ReductionError::NoApplicableSettings { .. }));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let angle = 2.0;
        let (min, max) = match_window(angle);
        let rows = vec![OverrideRow(row(&max.to_string(), "1", "2"))];
        let matched = select_row(&rows, angle).expect("rows are well formed");
        assert!(matches!(matched, Some(RowMatch { index: 0, kind: MatchKind::Angle, .. })));

        let rows = vec![OverrideRow(row(&min.to_string(), "1", "2"))];
        let matched = select_row(&rows, angle).expect("rows are well formed");
        assert!(matches!(matched, Some(RowMatch { index: 0, kind: MatchKind::Angle, .. })));
    }

    #[test]
    fn unmatched_angle_falls_back_to_default_row() {
        let doc = document(standard_rows(), json!(0), json!(0));

        let resolved = resolve_settings(&doc, 1.5, "INTER").expect("default row applies");
        assert_eq!(resolved.match_kind, MatchKind::Default);
        assert_eq!(resolved.matched_row, "row 2 (default)");
        assert_eq!(resolved.parameters.first_transmission_run_list, "INTER13460");
        assert_eq!(resolved.parameters.second_transmission_run_list, "INTER13461");
        assert_eq!(resolved.parameters.analysis_mode, "PointDetectorAnalysis");
        assert_eq!(resolved.parameters.detector_correction_type, "VerticalShift");
    }

    #[test]
    fn default_row_ahead_of_angle_rows_does_not_shadow_a_match() {
        let rows = vec![row("", "13460", "13461"), row("0.7", "13463", "13464")];
        let doc = document(rows, json!(1), json!(1));

        let resolved = resolve_settings(&doc, 0.7, "INTER").expect("angle row applies");
        assert_eq!(resolved.match_kind, MatchKind::Angle);
        assert_eq!(resolved.parameters.first_transmission_run_list, "INTER13463");
    }

    #[test]
    fn first_matching_row_wins_when_windows_overlap() {
        let rows = vec![row("1.001", "first", "a"), row("1.0", "second", "b")];
        let doc = document(rows, json!(1), json!(1));

        let resolved = resolve_settings(&doc, 1.0, "INTER").expect("both rows match");
        assert_eq!(resolved.matched_row, "row 0 (angle 1.001)");
        assert_eq!(resolved.parameters.first_transmission_run_list, "INTERfirst");
    }

    #[test]
    fn resolved_record_copies_row_and_view_fields() {
        let doc = document(standard_rows(), json!(1), json!(1));

        let parameters = resolve_settings(&doc, 2.3, "INTER")
            .expect("2.3 row applies")
            .parameters;
        assert_eq!(
            parameters,
            ResolvedParameters {
                analysis_mode: "MultiDetectorAnalysis".to_string(),
                first_transmission_run_list: "INTER13469".to_string(),
                second_transmission_run_list: "INTER13470".to_string(),
                transmission_processing_instructions: "4".to_string(),
                processing_instructions: "2.3-detectors".to_string(),
                start_overlap: 10.0,
                end_overlap: 12.0,
                scale_rhs_workspace: true,
                monitor_integration_wavelength_min: 4.0,
                monitor_integration_wavelength_max: 10.0,
                monitor_background_wavelength_min: 17.0,
                monitor_background_wavelength_max: 18.0,
                wavelength_min: 1.5,
                wavelength_max: 17.0,
                i_zero_monitor_index: 2,
                detector_correction_type: "RotateAroundSample".to_string(),
            }
        );
    }

    #[test]
    fn invalid_codes_abort_resolution() {
        let doc = document(standard_rows(), json!(2), json!(1));
        assert!(matches!(
            resolve_settings(&doc, 0.7, "INTER"),
            Err(ReductionError::InvalidCode { field: "analysisModeComboBox", .. })
        ));

        let doc = document(standard_rows(), json!(1), Value::Null);
        assert!(matches!(
            resolve_settings(&doc, 0.7, "INTER"),
            Err(ReductionError::InvalidCode {
                field: "detectorCorrectionTypeComboBox",
                ..
            })
        ));
    }

    #[test]
    fn malformed_rows_are_rejected() {
        let rows = vec![OverrideRow(vec!["abc".to_string()])];
        assert!(matches!(
            select_row(&rows, 1.0),
            Err(ReductionError::MalformedRow { index: 0, .. })
        ));

        let doc = document(vec![vec!["1.0".to_string(), "1".to_string()]], json!(1), json!(1));
        assert!(matches!(
            resolve_settings(&doc, 1.0, "INTER"),
            Err(ReductionError::MalformedRow { index: 0, .. })
        ));
    }

    #[test]
    fn settings_document_ignores_unknown_keys_and_reads_gui_names() {
        let raw = r#"
        {
          "experimentView": {
            "analysisModeComboBox": 1,
            "debugCheckBox": false,
            "perAngleDefaults": {
              "columnsNum": 10,
              "rows": [["", "13460", "13461", "4", "", "", "", "", "3-259", ""]],
              "rowsNum": 1
            },
            "startOverlapEdit": 10,
            "endOverlapEdit": 12,
            "transScaleRHSCheckBox": false
          },
          "instrumentView": {
            "monIntMinEdit": 4,
            "monIntMaxEdit": 10,
            "monBgMinEdit": 17,
            "monBgMaxEdit": 18,
            "lamMinEdit": 1.5,
            "lamMaxEdit": 17,
            "I0MonitorIndex": 2,
            "detectorCorrectionTypeComboBox": 0,
            "correctDetectorsCheckBox": true
          },
          "runsView": {}
        }
        "#;

        let doc: SettingsDocument = serde_json::from_str(raw).expect("gui batch file should parse");
        assert_eq!(doc.experiment.per_angle_defaults.rows.len(), 1);
        assert!(doc.experiment.per_angle_defaults.rows[0].is_default());
        assert_eq!(doc.instrument.wavelength_max, 17.0);

        let parameters = resolve_settings(&doc, 0.5, "INTER")
            .expect("default row applies")
            .parameters;
        assert_eq!(parameters.processing_instructions, "3-259");
        assert!(!parameters.scale_rhs_workspace);
    }
}
