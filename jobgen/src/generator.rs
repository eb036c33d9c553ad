use crate::{config::JobConfig, script::JobScript};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Output directory {0:?} does not exist")]
    MissingOutputDir(PathBuf),
    #[error("Failed to create log directory {path:?}: {source}")]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write job file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// paths written by a single run, in index order
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub written: Vec<PathBuf>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

/// Writes one job file per index, sequentially
#[derive(Debug, Clone)]
pub struct Generator {
    config: JobConfig,
}

impl Generator {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    /// all scripts of a run, without touching the file system
    pub fn plan(&self) -> impl Iterator<Item = JobScript> + '_ {
        self.config
            .indices()
            .map(move |index| JobScript::new(&self.config, index))
    }

    /// Write all job files, existing files are overwritten.
    ///
    /// Stops at the first failure. Files written up to that point are kept.
    #[instrument(skip(self), level = "info")]
    pub fn generate(&self) -> Result<Report, GeneratorError> {
        let output_dir = &self.config.output_dir;

        if !output_dir.is_dir() {
            return Err(GeneratorError::MissingOutputDir(output_dir.clone()));
        }

        if self.config.create_log_dir {
            let path = output_dir.join(&self.config.log_dir);

            fs::create_dir_all(&path).map_err(|source| GeneratorError::CreateLogDir {
                path: path.clone(),
                source,
            })?;
            debug!(path = ?path, "Created log directory");
        }

        let total = self.config.job_count();
        let mut report = Report::default();

        for script in self.plan() {
            let path = output_dir.join(script.file_name(&self.config.extension));

            match write_script(&path, &script.render()) {
                Ok(()) => debug!(path = ?path, index = script.index, "Wrote job file"),
                Err(source) => return Err(GeneratorError::Write { path, source }),
            }

            report.written.push(path);
        }

        if report.is_empty() {
            warn!(
                "Range {}..={} is empty, no job file written",
                self.config.first, self.config.last
            );
        } else {
            info!("Wrote {}/{total} job files to {:?}", report.len(), output_dir);
        }

        Ok(report)
    }
}

fn write_script(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;

    // scripts carry a shebang
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        file.set_permissions(fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}
