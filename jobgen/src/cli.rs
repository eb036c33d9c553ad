use crate::{
    config::{ConfigErrors, JobConfig, TimeLimit},
    generator::{Generator, GeneratorError, Report},
};
use clap::{ArgAction, Parser};
use std::{io, path::PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Generate(#[from] GeneratorError),
    #[error("Failed to print job scripts: {0}")]
    Output(#[from] io::Error),
}

/// Generate Slurm batch job files for the Forbidden Island simulation
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML config, omitted fields use the built-in defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// directory receiving the job files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// first job index (inclusive)
    #[arg(long)]
    pub first: Option<u32>,

    /// last job index (inclusive)
    #[arg(long)]
    pub last: Option<u32>,

    #[arg(long)]
    pub partition: Option<String>,

    /// wall clock limit, e.g. 00:10:00 or 1-12:00:00
    #[arg(long)]
    pub time: Option<TimeLimit>,

    /// number of games per simulation run
    #[arg(long)]
    pub games: Option<u64>,

    #[arg(long)]
    pub executable: Option<String>,

    /// create the log directory next to the job files
    #[arg(long)]
    pub create_log_dir: bool,

    /// print the scripts to stdout instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// load the config file if given and apply the command line overrides
    pub fn load_config(&self) -> Result<JobConfig, ConfigErrors> {
        let mut config = match &self.config {
            Some(path) => JobConfig::load(path)?,
            None => JobConfig::default(),
        };

        self.apply(&mut config);

        Ok(config)
    }

    pub fn apply(&self, config: &mut JobConfig) {
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(first) = self.first {
            config.first = first;
        }
        if let Some(last) = self.last {
            config.last = last;
        }
        if let Some(partition) = &self.partition {
            config.partition = partition.clone();
        }
        if let Some(time) = &self.time {
            config.time = time.clone();
        }
        if let Some(games) = self.games {
            config.games = games;
        }
        if let Some(executable) = &self.executable {
            config.executable = executable.clone();
        }
        if self.create_log_dir {
            config.create_log_dir = true;
        }
    }

    /// Load and check the config, then either print the scripts to `out` (dry run)
    /// or write the job files. Nothing is written if the config is rejected.
    pub fn run<W: io::Write>(&self, out: &mut W) -> Result<Option<Report>, RunError> {
        let config = self.load_config()?;

        if config.preflight_checks() {
            return Err(ConfigErrors::Preflight.into());
        }

        let generator = Generator::new(config);

        if self.dry_run {
            for script in generator.plan() {
                writeln!(out, "{script}")?;
            }
            info!("Dry run, no files written");

            return Ok(None);
        }

        Ok(Some(generator.generate()?))
    }

    /// default filter directive when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }

        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
