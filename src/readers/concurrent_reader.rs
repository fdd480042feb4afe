use crate::error::{AnalyticsError, Result};
use crate::models::Observation;
use crate::readers::ObservationReader;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Reads many observation files at once, one blocking task per group of files.
pub struct ConcurrentReader {
    max_workers: usize,
    reader: ObservationReader,
}

impl ConcurrentReader {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            reader: ObservationReader::new(),
        }
    }

    pub fn with_reader(mut self, reader: ObservationReader) -> Self {
        self.reader = reader;
        self
    }

    /// Read every `.csv` file directly under `dir`
    pub async fn read_directory(&self, dir: &Path) -> Result<Vec<Observation>> {
        let files = Self::find_observation_files(dir)?;
        if files.is_empty() {
            return Err(AnalyticsError::InvalidFormat(format!(
                "No observation files found in {}",
                dir.display()
            )));
        }
        self.read_files(files).await
    }

    /// Read all files; rows come back in file order
    pub async fn read_files(&self, files: Vec<PathBuf>) -> Result<Vec<Observation>> {
        let chunk_size = files.len().div_ceil(self.max_workers).max(1);
        debug!(files = files.len(), chunk_size, "Reading observation files");

        let handles: Vec<JoinHandle<Result<Vec<Observation>>>> = files
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let reader = self.reader;
                tokio::task::spawn_blocking(move || {
                    let per_file = chunk
                        .par_iter()
                        .map(|path| reader.read_observations(path))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(per_file.into_iter().flatten().collect())
                })
            })
            .collect();

        let mut observations = Vec::new();
        for handle in handles {
            observations.extend(handle.await??);
        }

        info!(
            files = files.len(),
            rows = observations.len(),
            "Loaded observations"
        );
        Ok(observations)
    }

    /// Read files and group the rows by city
    pub async fn read_grouped(
        &self,
        files: Vec<PathBuf>,
    ) -> Result<BTreeMap<String, Vec<Observation>>> {
        let observations = self.read_files(files).await?;
        let mut by_city: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for obs in observations {
            by_city.entry(obs.city.clone()).or_default().push(obs);
        }
        Ok(by_city)
    }

    fn find_observation_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if path.is_file() && is_csv {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Default for ConcurrentReader {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
