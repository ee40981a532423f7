use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod info;
mod keywords;
mod stages;

/// mzinfer - Metadata inference for orphan proteomics files
#[derive(Parser)]
#[command(name = "mzinfer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage: tools, features, predictions, metadata and keywords
    Run {
        /// Directory holding the mzML files
        #[arg(long, value_name = "DIR")]
        mzml_dir: PathBuf,

        /// Directory receiving every artifact
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Read identification results from here instead of OUTPUT/idxml
        #[arg(long, value_name = "DIR")]
        idxml_dir: Option<PathBuf>,

        /// Directory holding the model artifacts
        #[arg(long, value_name = "DIR")]
        models_dir: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Do not invoke external tools; their outputs must already exist
        #[arg(long)]
        skip_tools: bool,
    },

    /// Build the feature table from existing reports and identifications
    Features {
        /// Directory holding the artifacts
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Read identification results from here instead of OUTPUT/idxml
        #[arg(long, value_name = "DIR")]
        idxml_dir: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Predict metadata with every configured model
    Predict {
        /// Directory holding the feature table
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Directory holding the model artifacts
        #[arg(long, value_name = "DIR")]
        models_dir: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Arbitrate model predictions and write the narrative fields
    Annotate {
        /// Directory holding the prediction tables
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Directory holding model metrics
        #[arg(long, value_name = "DIR")]
        models_dir: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Scan mzML files for experiment keywords
    Keywords {
        /// Directory holding the mzML files
        #[arg(long, value_name = "DIR")]
        mzml_dir: PathBuf,

        /// Directory receiving the keyword table
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Concurrent file scans
        #[arg(short = 'w', long)]
        workers: Option<usize>,
    },

    /// Display columns, row count and missing values of a table artifact
    Info {
        /// CSV artifact path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            mzml_dir,
            output_dir,
            idxml_dir,
            models_dir,
            config,
            skip_tools,
        } => stages::run(mzml_dir, output_dir, idxml_dir, models_dir, config, skip_tools),
        Commands::Features {
            output_dir,
            idxml_dir,
            config,
        } => stages::features(output_dir, idxml_dir, config),
        Commands::Predict {
            output_dir,
            models_dir,
            config,
        } => stages::predict(output_dir, models_dir, config),
        Commands::Annotate {
            output_dir,
            models_dir,
            config,
        } => stages::annotate(output_dir, models_dir, config),
        Commands::Keywords {
            mzml_dir,
            output_dir,
            workers,
        } => keywords::run(mzml_dir, output_dir, workers),
        Commands::Info { file } => info::run(file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "mzinfer",
            "-vv",
            "run",
            "--mzml-dir",
            "raw",
            "--output-dir",
            "out",
            "--skip-tools",
        ])
        .unwrap();

        assert_eq!(cli.verbosity(), 2);
        match cli.command {
            Commands::Run {
                mzml_dir,
                skip_tools,
                idxml_dir,
                ..
            } => {
                assert_eq!(mzml_dir, PathBuf::from("raw"));
                assert!(skip_tools);
                assert!(idxml_dir.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_keywords_requires_mzml_dir() {
        assert!(Cli::try_parse_from(["mzinfer", "keywords", "--output-dir", "out"]).is_err());
    }
}
