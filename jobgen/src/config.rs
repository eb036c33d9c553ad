use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid time limit '{0}', expected MM, MM:SS, HH:MM:SS, D-HH, D-HH:MM or D-HH:MM:SS")]
    InvalidTimeLimit(String),
    #[error("Config failed the preflight checks")]
    Preflight,
}

/// Slurm wall clock limit, kept in the notation it was given in
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct TimeLimit(String);

impl TimeLimit {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TimeLimit {
    type Err = ConfigErrors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigErrors::InvalidTimeLimit(value.to_owned());

        let (days, clock) = match value.split_once('-') {
            Some((days, clock)) => (Some(days), clock),
            None => (None, value),
        };

        if let Some(days) = days {
            parse_time_field(days, None).ok_or_else(invalid)?;
        }

        let fields: Vec<&str> = clock.split(':').collect();
        // upper bound (exclusive) per field, the leading field is unbounded without days
        let bounds: &[Option<u64>] = match (days.is_some(), fields.len()) {
            (false, 1) => &[None],
            (false, 2) => &[None, Some(60)],
            (false, 3) => &[None, Some(60), Some(60)],
            (true, 1) => &[Some(24)],
            (true, 2) => &[Some(24), Some(60)],
            (true, 3) => &[Some(24), Some(60), Some(60)],
            _ => return Err(invalid()),
        };

        for (field, bound) in fields.iter().zip(bounds) {
            parse_time_field(field, *bound).ok_or_else(invalid)?;
        }

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for TimeLimit {
    type Error = ConfigErrors;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeLimit> for String {
    fn from(limit: TimeLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_time_field(field: &str, bound: Option<u64>) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let value = field.parse::<u64>().ok()?;
    match bound {
        Some(bound) if value >= bound => None,
        _ => Some(value),
    }
}

/// `<digits>[k|m|g|t][b]`, case insensitive, as accepted by `sbatch --mem`
fn is_valid_memory(mem: &str) -> bool {
    let digits = mem.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }

    matches!(
        mem[digits..].to_ascii_lowercase().as_str(),
        "" | "k" | "m" | "g" | "t" | "kb" | "mb" | "gb" | "tb"
    )
}

/// upper bound on the number of job files per run, matches slurm's default `MaxJobCount`
pub const MAX_JOBS: u64 = 10_000;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    // job names are `<name_prefix>_<index>`
    pub name_prefix: String,
    pub time: TimeLimit,
    pub ntasks: u32,
    pub mem: String,
    // per job log is written to `<log_dir>/<index>.log` by slurm
    pub log_dir: PathBuf,
    pub partition: String,
    pub nodes: u32,
    // simulation binary, invoked as `<executable> -g <games> -t <index>`
    pub executable: String,
    pub games: u64,
    pub first: u32,
    pub last: u32,
    pub extension: String,
    pub output_dir: PathBuf,
    pub create_log_dir: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            time: default_time(),
            ntasks: 32,
            mem: "100mb".to_owned(),
            log_dir: PathBuf::from("./logs"),
            partition: "teach".to_owned(),
            nodes: 1,
            executable: default_executable(),
            games: 5_000_000,
            first: 1,
            last: 32,
            extension: "job".to_owned(),
            output_dir: PathBuf::from("."),
            create_log_dir: false,
        }
    }
}

impl JobConfig {
    /// read a YAML config, omitted fields fall back to their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        debug!(path = ?path, "Loading config");

        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn from_yaml(input: &str) -> Result<Self, ConfigErrors> {
        // an empty document is valid and yields the defaults
        if input.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(input)?)
    }

    pub fn indices(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }

    /// number of job files in the range, 0 if it is empty
    pub fn job_count(&self) -> u64 {
        if self.first > self.last {
            0
        } else {
            u64::from(self.last - self.first) + 1
        }
    }

    /// Validate the config, logging every problem found.
    /// Returns true if at least one error was found.
    pub fn preflight_checks(&self) -> bool {
        // collect all errors instead of stopping at the first one
        let mut contains_error = false;

        if self.first == 0 {
            error!("first must be at least 1, job indices start at 1");
            contains_error = true;
        }

        if self.first > self.last {
            error!(
                "first ({}) is larger than last ({}), no job would be generated",
                self.first, self.last
            );
            contains_error = true;
        } else if self.job_count() > MAX_JOBS {
            error!(
                "range {}..={} spans {} jobs, at most {MAX_JOBS} are allowed",
                self.first,
                self.last,
                self.job_count()
            );
            contains_error = true;
        }

        for (name, value) in [("ntasks", self.ntasks), ("nodes", self.nodes)] {
            if value == 0 {
                error!("{name} cannot be 0");
                contains_error = true;
            }
        }

        if self.games == 0 {
            error!("games cannot be 0, the simulation would not run a single game");
            contains_error = true;
        }

        let log_dir = self.log_dir.to_string_lossy();
        for (name, value) in [
            ("name_prefix", self.name_prefix.as_str()),
            ("mem", self.mem.as_str()),
            ("partition", self.partition.as_str()),
            ("executable", self.executable.as_str()),
            ("extension", self.extension.as_str()),
            ("log_dir", &*log_dir),
        ] {
            if value.is_empty() {
                error!("{name} cannot be empty");
                contains_error = true;
            } else if value.chars().any(char::is_whitespace) {
                error!("{name} ('{value}') cannot contain whitespace");
                contains_error = true;
            }
        }

        if !self.mem.is_empty() && !is_valid_memory(&self.mem) {
            error!(
                "mem ('{}') must be a number followed by an optional unit (K, M, G, T)",
                self.mem
            );
            contains_error = true;
        }

        if self.extension.contains(['/', '\\']) || self.extension.starts_with('.') {
            error!(
                "extension ('{}') must be a bare extension without a leading dot or separators",
                self.extension
            );
            contains_error = true;
        }

        if self.ntasks < self.nodes {
            warn!(
                "ntasks ({}) is smaller than nodes ({}), some nodes will stay idle",
                self.ntasks, self.nodes
            );
        }

        contains_error
    }
}

fn default_name_prefix() -> String {
    "FIS".to_owned()
}

fn default_time() -> TimeLimit {
    TimeLimit("00:10:00".to_owned())
}

fn default_executable() -> String {
    "./forbidden_island_simulation".to_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn time_limit_accepts_slurm_formats() {
        for limit in [
            "10", "10:30", "00:10:00", "48:00:00", "1-12", "1-12:30", "2-00:00:00",
        ] {
            assert_eq!(limit.parse::<TimeLimit>().unwrap().as_str(), limit);
        }
    }

    #[test]
    fn time_limit_rejects_malformed() {
        for limit in [
            "", "abc", "10:60", "00:10:60", "1-24", "1-", "-10", "1:2:3:4", "1-2:3:4:5", " 10",
        ] {
            assert!(
                matches!(
                    limit.parse::<TimeLimit>(),
                    Err(ConfigErrors::InvalidTimeLimit(value)) if value == limit
                ),
                "{limit:?} should be rejected"
            );
        }
    }

    #[test]
    fn memory_units() {
        assert!(is_valid_memory("100mb"));
        assert!(is_valid_memory("1G"));
        assert!(is_valid_memory("2048"));
        assert!(!is_valid_memory("mb"));
        assert!(!is_valid_memory("100 mb"));
        assert!(!is_valid_memory("1.5G"));
        assert!(!is_valid_memory("10pb"));
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(JobConfig::from_yaml("").unwrap(), JobConfig::default());
        assert_eq!(JobConfig::from_yaml("\n  \n").unwrap(), JobConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = JobConfig::from_yaml("partition: batch\ntime: '1-00:00:00'\nlast: 4\n").unwrap();

        assert_eq!(config.partition, "batch");
        assert_eq!(config.time.as_str(), "1-00:00:00");
        assert_eq!(config.indices(), 1..=4);
        assert_eq!(config.name_prefix, "FIS");
        assert_eq!(config.games, 5_000_000);
    }

    #[test]
    fn yaml_rejects_unknown_fields() {
        assert!(matches!(
            JobConfig::from_yaml("partitions: batch\n"),
            Err(ConfigErrors::Parse(_))
        ));
    }

    #[test]
    fn yaml_rejects_bad_time_limit() {
        assert!(matches!(
            JobConfig::from_yaml("time: '00:99:00'\n"),
            Err(ConfigErrors::Parse(_))
        ));
    }

    #[test]
    fn default_passes_preflight() {
        assert!(!JobConfig::default().preflight_checks());
    }

    #[test]
    fn preflight_catches_errors() {
        let broken = [
            JobConfig {
                first: 0,
                ..JobConfig::default()
            },
            JobConfig {
                first: 10,
                last: 9,
                ..JobConfig::default()
            },
            JobConfig {
                last: u32::MAX,
                ..JobConfig::default()
            },
            JobConfig {
                first: 5,
                last: 5 + MAX_JOBS as u32,
                ..JobConfig::default()
            },
            JobConfig {
                ntasks: 0,
                ..JobConfig::default()
            },
            JobConfig {
                games: 0,
                ..JobConfig::default()
            },
            JobConfig {
                partition: String::new(),
                ..JobConfig::default()
            },
            JobConfig {
                name_prefix: "FIS run".to_owned(),
                ..JobConfig::default()
            },
            JobConfig {
                mem: "lots".to_owned(),
                ..JobConfig::default()
            },
            JobConfig {
                extension: ".job".to_owned(),
                ..JobConfig::default()
            },
        ];

        for config in broken {
            assert!(config.preflight_checks(), "{config:?} should fail");
        }
    }

    #[test]
    fn job_count_and_span_limit() {
        assert_eq!(JobConfig::default().job_count(), 32);
        assert_eq!(
            JobConfig {
                first: 2,
                last: 1,
                ..JobConfig::default()
            }
            .job_count(),
            0
        );

        let largest = JobConfig {
            first: 1,
            last: MAX_JOBS as u32,
            ..JobConfig::default()
        };
        assert_eq!(largest.job_count(), MAX_JOBS);
        assert!(!largest.preflight_checks());
    }

    #[test]
    fn fewer_tasks_than_nodes_is_only_a_warning() {
        let config = JobConfig {
            ntasks: 1,
            nodes: 2,
            ..JobConfig::default()
        };

        assert!(!config.preflight_checks());
    }
}
