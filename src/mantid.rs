use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::angle::MotorLog;
use crate::error::ReductionError;
use crate::model::{ReductionOutputs, ResolvedParameters, RunIdentity};

pub const REDUCTION_ALGORITHM: &str = "ReflectometryISISLoadAndProcess";
pub const RESULT_MARKER: &str = "INTER_REDUCE_RESULT ";
pub const NEXUS_EXTENSION: &str = "nxs";

/// Everything the reduction algorithm needs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ReductionRequest {
    pub run: RunIdentity,
    pub input_file: PathBuf,
    pub theta: f64,
    pub parameters: ResolvedParameters,
}

/// Seam to the scientific-computing framework that owns loading and reduction.
pub trait ReductionBackend {
    /// Load the run and return the named motor log, times relative to run start.
    fn load_motor_log(
        &self,
        run: &RunIdentity,
        input_file: &Path,
        log_name: &str,
    ) -> Result<MotorLog, ReductionError>;

    /// Run the reduction and save both output workspaces as NeXus files in
    /// `output_dir`, named after the workspaces.
    fn reduce_and_save(
        &self,
        request: &ReductionRequest,
        output_dir: &Path,
    ) -> Result<ReductionOutputs, ReductionError>;
}

/// Drives Mantid through a Python interpreter that can `import mantid`.
#[derive(Debug, Clone)]
pub struct MantidProcess {
    python: PathBuf,
}

#[derive(Serialize)]
struct LoadLogPayload<'a> {
    run_name: &'a str,
    run_number: &'a str,
    search_dir: String,
    log_name: &'a str,
}

#[derive(Serialize)]
struct ReducePayload<'a> {
    algorithm: &'static str,
    search_dir: String,
    output_dir: String,
    extension: &'static str,
    properties: ReduceProperties<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReduceProperties<'a> {
    input_run_list: &'a str,
    theta_in: f64,
    #[serde(flatten)]
    parameters: &'a ResolvedParameters,
}

impl MantidProcess {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn run_script<P: Serialize, R: DeserializeOwned>(
        &self,
        label: &str,
        script: &str,
        payload: &P,
    ) -> Result<R, ReductionError> {
        let payload = serde_json::to_vec(payload).map_err(|err| {
            ReductionError::Collaborator(format!("failed to encode {label} payload: {err}"))
        })?;

        debug!(python = %self.python.display(), step = label, "starting mantid subprocess");

        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                ReductionError::Collaborator(format!(
                    "failed to execute {} for {label}: {err}",
                    self.python.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).map_err(|err| {
                ReductionError::Collaborator(format!("failed to send {label} payload: {err}"))
            })?;
        }

        let output = child.wait_with_output().map_err(|err| {
            ReductionError::Collaborator(format!("failed to wait for {label}: {err}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReductionError::Collaborator(format!(
                "{label} returned non-zero exit status: {}",
                stderr.trim()
            )));
        }

        parse_result_line(label, &String::from_utf8_lossy(&output.stdout))
    }
}

impl ReductionBackend for MantidProcess {
    fn load_motor_log(
        &self,
        run: &RunIdentity,
        input_file: &Path,
        log_name: &str,
    ) -> Result<MotorLog, ReductionError> {
        let payload = LoadLogPayload {
            run_name: &run.run_name,
            run_number: &run.run_number,
            search_dir: search_dir_for(input_file),
            log_name,
        };

        let log: MotorLog = self.run_script("Load", LOAD_LOG_SCRIPT, &payload)?;
        info!(
            run = %run.run_name,
            log = %log.name,
            readbacks = log.values.len(),
            end_time = log.end_time,
            "loaded motor log"
        );
        Ok(log)
    }

    fn reduce_and_save(
        &self,
        request: &ReductionRequest,
        output_dir: &Path,
    ) -> Result<ReductionOutputs, ReductionError> {
        let payload = ReducePayload {
            algorithm: REDUCTION_ALGORITHM,
            search_dir: search_dir_for(&request.input_file),
            output_dir: output_dir.display().to_string(),
            extension: NEXUS_EXTENSION,
            properties: ReduceProperties {
                input_run_list: &request.run.run_name,
                theta_in: request.theta,
                parameters: &request.parameters,
            },
        };

        let outputs: ReductionOutputs = self.run_script(REDUCTION_ALGORITHM, REDUCE_SCRIPT, &payload)?;
        info!(
            output_workspace = %outputs.output_workspace,
            output_workspace_binned = %outputs.output_workspace_binned,
            "reduction finished"
        );
        Ok(outputs)
    }
}

fn search_dir_for(input_file: &Path) -> String {
    input_file
        .parent()
        .map(|parent| parent.display().to_string())
        .unwrap_or_default()
}

/// Find the last marked JSON line on stdout; Mantid logs freely to stdout too.
pub fn parse_result_line<R: DeserializeOwned>(label: &str, stdout: &str) -> Result<R, ReductionError> {
    let line = stdout
        .lines()
        .rev()
        .find_map(|line| line.trim_end().strip_prefix(RESULT_MARKER))
        .ok_or_else(|| {
            ReductionError::Collaborator(format!("{label} produced no result line"))
        })?;

    serde_json::from_str(line).map_err(|err| {
        ReductionError::Collaborator(format!("failed to parse {label} result: {err}"))
    })
}

/// Output file path for a saved workspace.
pub fn nexus_path(output_dir: &Path, workspace: &str) -> PathBuf {
    output_dir.join(format!("{workspace}.{NEXUS_EXTENSION}"))
}

const LOAD_LOG_SCRIPT: &str = r#"
import json, sys
import numpy as np
from mantid.kernel import config
from mantid.simpleapi import Load

request = json.load(sys.stdin)
if request["search_dir"]:
    config.appendDataSearchDir(request["search_dir"])

ws = Load(Filename=request["run_name"], OutputWorkspace="TOF_" + request["run_number"])
run = ws.getRun()
log = run.getLogData(request["log_name"])
start = run.startTime().to_datetime64()
second = np.timedelta64(1, "s")
times = ((np.asarray(log.times) - start) / second).tolist()
end_time = float((run.endTime().to_datetime64() - start) / second)
values = [float(v) for v in log.value]

print("INTER_REDUCE_RESULT " + json.dumps({
    "name": request["log_name"],
    "times": times,
    "values": values,
    "end_time": end_time,
}))
"#;

const REDUCE_SCRIPT: &str = r#"
import json, os, sys
from mantid.kernel import config
from mantid.simpleapi import AlgorithmManager, SaveNexus

request = json.load(sys.stdin)
if request["search_dir"]:
    config.appendDataSearchDir(request["search_dir"])

alg = AlgorithmManager.create(request["algorithm"])
alg.setProperties(request["properties"])
alg.execute()

names = [alg.getPropertyValue("OutputWorkspace"), alg.getPropertyValue("OutputWorkspaceBinned")]
files = []
for name in names:
    path = os.path.join(request["output_dir"], name + "." + request["extension"])
    SaveNexus(name, path)
    files.append(path)

print("INTER_REDUCE_RESULT " + json.dumps({
    "output_workspace": names[0],
    "output_workspace_binned": names[1],
    "files": files,
}))
"#;
