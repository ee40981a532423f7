//! # External Tool Boundary
//!
//! Instrument-info extraction, tolerance prediction and the identification
//! search are third-party programs. The pipeline only sees them through
//! [`ToolRunner`]: run an invocation, get success or a [`ToolError`]. Each
//! per-sample step is skipped when its output already exists, and a failed
//! invocation is logged and the sample moves on; nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::artifact;
use crate::report;

pub use params::{ParameterFile, Resolution, SearchSettings};

pub mod params;

/// Errors raised at the tool boundary
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// I/O error around a tool run
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The program could not be started
    #[error("Failed to start {program}: {source}")]
    SpawnError {
        /// Program name
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The program exited unsuccessfully
    #[error("{program} exited with {status}")]
    Failed {
        /// Program name
        program: String,
        /// Exit status description
        status: String,
    },
}

/// One external program run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program to execute
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
    /// File receiving the program's standard output, if captured
    pub stdout: Option<PathBuf>,
}

impl ToolInvocation {
    /// Invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Capture standard output into `path`
    pub fn capture_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Shell-like rendering for diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs external programs
pub trait ToolRunner {
    /// Run to completion; `Ok` only for a successful exit
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError>;
}

/// Runs programs as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        info!("Running: {}", invocation.command_line());
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);

        let spawn_error = |source| ToolError::SpawnError {
            program: invocation.program.clone(),
            source,
        };

        let status = match &invocation.stdout {
            Some(path) => {
                let output = command
                    .stdout(Stdio::piped())
                    .output()
                    .map_err(spawn_error)?;
                if output.status.success() {
                    artifact::persist_atomically::<ToolError, _>(path, |file| {
                        std::io::Write::write_all(file, &output.stdout)?;
                        Ok(())
                    })?;
                }
                output.status
            }
            None => command.status().map_err(spawn_error)?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                program: invocation.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// Programs and search resources used by the tool stages
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    /// Instrument-info extraction program
    pub fileinfo: String,
    /// Tolerance prediction program
    pub param_medic: String,
    /// Identification search wrapper
    pub comet_adapter: String,
    /// Search engine executable handed to the wrapper
    pub comet_executable: String,
    /// Protein sequence database; the search is skipped without one
    pub database: Option<PathBuf>,
    /// Search threads
    pub threads: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            fileinfo: "FileInfo".to_string(),
            param_medic: "param-medic".to_string(),
            comet_adapter: "CometAdapter".to_string(),
            comet_executable: "comet.exe".to_string(),
            database: None,
            threads: 16,
        }
    }
}

/// Number of samples each tool stage handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStats {
    /// Invocations that succeeded
    pub succeeded: usize,
    /// Invocations that failed
    pub failed: usize,
    /// Samples whose output already existed
    pub skipped: usize,
}

impl ToolStats {
    fn record(&mut self, result: Result<(), ToolError>, sample: &str) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                warn!("Error processing {}: {}. Skipping to the next file.", sample, e);
                self.failed += 1;
            }
        }
    }
}

fn stem_of(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(suffix).unwrap_or(&name).to_string()
}

fn sample_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Produce `fileinfo_dir/{stem}.txt` for every mzML in `mzml_dir`
pub fn generate_fileinfo(
    runner: &dyn ToolRunner,
    config: &ToolConfig,
    mzml_dir: &Path,
    fileinfo_dir: &Path,
) -> Result<ToolStats, ToolError> {
    fs::create_dir_all(fileinfo_dir)?;
    let mut stats = ToolStats::default();

    for mzml in artifact::list_files(mzml_dir, ".mzML")? {
        let out = fileinfo_dir.join(format!("{}.txt", stem_of(&mzml, ".mzML")));
        if artifact::is_present(&out) {
            debug!("Fileinfo file for {} already exists", mzml.display());
            stats.skipped += 1;
            continue;
        }
        let invocation = ToolInvocation::new(&config.fileinfo)
            .arg("-in")
            .arg(&mzml)
            .args(["-m", "-p", "-s", "-c"])
            .arg("-out")
            .arg(&out);
        stats.record(runner.run(&invocation), &sample_name(&mzml));
    }
    Ok(stats)
}

/// Produce `tolerances_dir/{stem}_params.txt` for every mzML in `mzml_dir`
pub fn predict_tolerances(
    runner: &dyn ToolRunner,
    config: &ToolConfig,
    mzml_dir: &Path,
    tolerances_dir: &Path,
) -> Result<ToolStats, ToolError> {
    fs::create_dir_all(tolerances_dir)?;
    let mut stats = ToolStats::default();

    for mzml in artifact::list_files(mzml_dir, ".mzML")? {
        let out = tolerances_dir.join(format!("{}_params.txt", stem_of(&mzml, ".mzML")));
        if artifact::is_present(&out) {
            stats.skipped += 1;
            continue;
        }
        let invocation = ToolInvocation::new(&config.param_medic)
            .arg(&mzml)
            .capture_stdout(&out);
        stats.record(runner.run(&invocation), &sample_name(&mzml));
    }
    Ok(stats)
}

/// Write `param_dir/{stem}_params_comet_params.txt` for every tolerance
/// prediction, combining it with the sample's instrument-info report.
/// Existing parameter files are left untouched.
pub fn write_parameter_files(
    tolerances_dir: &Path,
    fileinfo_dir: &Path,
    param_dir: &Path,
) -> Result<ToolStats, ToolError> {
    fs::create_dir_all(param_dir)?;
    let mut stats = ToolStats::default();

    for prediction_path in artifact::list_files(tolerances_dir, "_params.txt")? {
        let stem = stem_of(&prediction_path, "_params.txt");
        let out = param_dir.join(format!("{stem}_params_comet_params.txt"));
        if artifact::is_present(&out) {
            debug!("Parameter file for {} already exists", stem);
            stats.skipped += 1;
            continue;
        }

        let prediction = fs::read_to_string(&prediction_path)?;
        let values = params::parse_tolerance_prediction(&prediction);
        if values.is_none() {
            warn!("No tolerance prediction in {}", prediction_path.display());
        }

        let report_path = fileinfo_dir.join(format!("{stem}.txt"));
        let (instrument, activation) = match fs::read_to_string(&report_path) {
            Ok(content) => {
                let features = report::parse_report(&format!("{stem}.mzML"), &content);
                (
                    Some(features.instrument_model),
                    params::listed_activation_methods(&content),
                )
            }
            Err(_) => {
                debug!("No instrument-info report for {}", stem);
                (None, None)
            }
        };

        let parameters =
            ParameterFile::derive(values.as_deref(), instrument.as_deref(), activation.as_deref());
        artifact::persist_atomically::<ToolError, _>(&out, |file| {
            std::io::Write::write_all(file, parameters.render().as_bytes())?;
            Ok(())
        })?;
        stats.succeeded += 1;
    }

    info!(
        "Wrote {} search parameter files to {} ({} already present)",
        stats.succeeded,
        param_dir.display(),
        stats.skipped
    );
    Ok(stats)
}

/// Run the identification search for every mzML without an idXML yet.
///
/// A failed search leaves a zero-byte placeholder so the sample is neither
/// retried nor summarized. Without a configured database nothing runs.
pub fn run_identification(
    runner: &dyn ToolRunner,
    config: &ToolConfig,
    mzml_dir: &Path,
    param_dir: &Path,
    idxml_dir: &Path,
) -> Result<ToolStats, ToolError> {
    let Some(database) = &config.database else {
        warn!("No protein database configured; identification search skipped");
        return Ok(ToolStats::default());
    };
    fs::create_dir_all(idxml_dir)?;
    let mut stats = ToolStats::default();

    for mzml in artifact::list_files(mzml_dir, ".mzML")? {
        let stem = stem_of(&mzml, ".mzML");
        let out = idxml_dir.join(format!("{stem}{}", crate::ident::IDXML_SUFFIX));
        if artifact::is_present(&out) {
            stats.skipped += 1;
            continue;
        }

        let param_path = param_dir.join(format!("{stem}_params_comet_params.txt"));
        let settings = match fs::read_to_string(&param_path) {
            Ok(content) => SearchSettings::parse(&content),
            Err(_) => {
                warn!(
                    "No parameter file {}; searching with defaults",
                    param_path.display()
                );
                SearchSettings::default()
            }
        };

        let invocation = ToolInvocation::new(&config.comet_adapter)
            .arg("-in")
            .arg(&mzml)
            .arg("-out")
            .arg(&out)
            .arg("-database")
            .arg(database)
            .arg("-comet_executable")
            .arg(&config.comet_executable)
            .args(["-spectrum_batch_size", "0"])
            .arg("-precursor_mass_tolerance")
            .arg(format!("{:?}", settings.precursor_mass_tolerance))
            .arg("-fragment_mass_tolerance")
            .arg(format!("{:?}", settings.fragment_mass_tolerance))
            .arg("-instrument")
            .arg(&settings.instrument)
            .arg("-activation_method")
            .arg(&settings.activation_method)
            .arg("-threads")
            .arg(config.threads.to_string())
            .arg("-force");

        let result = runner.run(&invocation);
        if result.is_err() {
            fs::File::create(&out)?;
        }
        stats.record(result, &sample_name(&mzml));
    }
    Ok(stats)
}
