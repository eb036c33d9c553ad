use crate::config::{JobConfig, TimeLimit};
use itertools::Itertools;
use std::{fmt, path::PathBuf};

/// `#SBATCH` directives in the order they are emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    JobName(String),
    Time(TimeLimit),
    NTasks(u32),
    Mem(String),
    Output(PathBuf),
    Partition(String),
    Nodes(u32),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobName(name) => write!(f, "#SBATCH --job-name={name}"),
            Self::Time(limit) => write!(f, "#SBATCH --time={limit}"),
            Self::NTasks(tasks) => write!(f, "#SBATCH --ntasks={tasks}"),
            Self::Mem(mem) => write!(f, "#SBATCH --mem={mem}"),
            Self::Output(path) => write!(f, "#SBATCH --output={}", path.display()),
            Self::Partition(partition) => write!(f, "#SBATCH --partition={partition}"),
            Self::Nodes(nodes) => write!(f, "#SBATCH --nodes={nodes}"),
        }
    }
}

/// A single batch submission script, fully determined by its config and index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScript {
    pub index: u32,
    pub directives: Vec<Directive>,
    pub commands: Vec<String>,
}

impl JobScript {
    pub fn new(config: &JobConfig, index: u32) -> Self {
        Self {
            index,
            directives: vec![
                Directive::JobName(format!("{}_{index}", config.name_prefix)),
                Directive::Time(config.time.clone()),
                Directive::NTasks(config.ntasks),
                Directive::Mem(config.mem.clone()),
                Directive::Output(config.log_dir.join(format!("{index}.log"))),
                Directive::Partition(config.partition.clone()),
                Directive::Nodes(config.nodes),
            ],
            commands: vec![
                format!("echo {index}"),
                format!("{} -g {} -t {index}", config.executable, config.games),
            ],
        }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.index)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JobScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#!/bin/bash")?;
        writeln!(f, "{}", self.directives.iter().join("\n"))?;
        writeln!(f)?;
        writeln!(f, "{}", self.commands.iter().join("\n"))
    }
}
