use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReductionError;
use crate::mantid::ReductionBackend;
use crate::model::RunIdentity;

/// Time-stamped motor readbacks, seconds relative to run start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorLog {
    pub name: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    /// End of the exposure in seconds from run start.
    pub end_time: f64,
}

impl MotorLog {
    /// Arithmetic mean of the readbacks logged between `start` and the end of
    /// the exposure, both inclusive.
    pub fn mean_since(&self, start: f64) -> Result<f64, ReductionError> {
        if self.times.len() != self.values.len() {
            return Err(ReductionError::MalformedInput(format!(
                "log {} has {} timestamps but {} values",
                self.name,
                self.times.len(),
                self.values.len()
            )));
        }

        let (sum, count) = self
            .times
            .iter()
            .zip(&self.values)
            .filter(|(time, _)| start <= **time && **time <= self.end_time)
            .fold((0.0, 0_usize), |(sum, count), (_, value)| {
                (sum + value, count + 1)
            });

        if count == 0 {
            return Err(ReductionError::MalformedInput(format!(
                "log {} has no readbacks between {start}s and {}s",
                self.name, self.end_time
            )));
        }

        Ok(sum / count as f64)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedAngle {
    pub run: RunIdentity,
    pub theta: f64,
    /// Number of readbacks in the loaded log, before windowing.
    pub readback_count: usize,
}

/// Extract the run number that follows the instrument token in the file name.
///
/// `INTER00013460.nxs` becomes run `13460`, named `INTER13460`.
pub fn parse_run_identity(input_file: &Path, instrument: &str) -> Result<RunIdentity, ReductionError> {
    let filename = input_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            ReductionError::MalformedInput(format!(
                "input path has no UTF-8 file name: {}",
                input_file.display()
            ))
        })?;

    let pattern = Regex::new(&format!(r"{}(\d+)", regex::escape(instrument)))
        .map_err(|err| ReductionError::MalformedInput(format!("invalid instrument name {instrument:?}: {err}")))?;

    let digits = pattern
        .captures(filename)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ReductionError::MalformedInput(format!(
                "file name does not contain {instrument} followed by a run number: {filename}"
            ))
        })?;

    let trimmed = digits.trim_start_matches('0');
    let run_number = if trimmed.is_empty() { "0" } else { trimmed }.to_string();

    Ok(RunIdentity {
        instrument: instrument.to_string(),
        run_name: format!("{instrument}{run_number}"),
        run_number,
    })
}

/// Load the run through the backend and average its motor log from time zero.
pub fn resolve_angle(
    backend: &dyn ReductionBackend,
    input_file: &Path,
    instrument: &str,
    log_name: &str,
) -> Result<ResolvedAngle, ReductionError> {
    let run = parse_run_identity(input_file, instrument)?;
    let log = backend.load_motor_log(&run, input_file, log_name)?;
    let theta = log.mean_since(0.0)?;

    Ok(ResolvedAngle {
        readback_count: log.values.len(),
        run,
        theta,
    })
}
