use chrono::{DateTime, Utc};
use log::error;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scheduler::interval::Interval;
use crate::scheduler::observation::Observation;
use crate::station::StationId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Observation not found: {0}")]
    NotFound(String),
    #[error("Observation overlap detected on station {0}")]
    Overlap(StationId),
}

/// Observations as one YAML file each, under
/// `<base>/observations/<station>/<id>.yaml`.
pub struct Storage {
    base: PathBuf,
}

impl Storage {
    pub fn new(base: PathBuf) -> Self {
        Storage { base }
    }

    fn observations_path(&self) -> PathBuf {
        self.base.join("observations")
    }

    fn station_path(&self, station: StationId) -> PathBuf {
        self.observations_path().join(station.to_string())
    }

    fn observation_path(&self, station: StationId, id: &str) -> PathBuf {
        self.station_path(station).join(format!("{}.yaml", id))
    }

    fn read_observation(path: &Path) -> Result<Observation, StorageError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Observations of one station, sorted by start.
    pub fn get_observations(&self, station: StationId) -> Result<Vec<Observation>, StorageError> {
        let path = self.station_path(station);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut observations = Vec::new();
        for entry in path.read_dir()? {
            let entry_path = entry?.path();

            if !entry_path.is_file() || entry_path.extension().map_or(true, |ext| ext != "yaml") {
                continue;
            }

            match Self::read_observation(&entry_path) {
                Ok(observation) => observations.push(observation),
                Err(e) => {
                    error!(
                        "Failed to load observation {}: {}",
                        entry_path.display(),
                        e
                    );
                }
            }
        }

        observations.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
        Ok(observations)
    }

    /// Observations of every station, sorted by start.
    pub fn all_observations(&self) -> Result<Vec<Observation>, StorageError> {
        let path = self.observations_path();

        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut observations = Vec::new();
        for entry in path.read_dir()? {
            let entry_path = entry?.path();
            let station = entry_path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<StationId>().ok());

            match station {
                Some(station) if entry_path.is_dir() => {
                    observations.extend(self.get_observations(station)?)
                }
                _ => continue,
            }
        }

        observations.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
        Ok(observations)
    }

    /// Booked intervals of a station overlapping `[start, end)`, sorted.
    pub fn existing_bookings(
        &self,
        station: StationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Interval>, StorageError> {
        let range = Interval::new(start, end);
        Ok(self
            .get_observations(station)?
            .iter()
            .map(Observation::interval)
            .filter(|i| i.overlaps(&range))
            .collect())
    }

    pub fn get_observation(&self, id: &str) -> Result<Observation, StorageError> {
        self.all_observations()?
            .into_iter()
            .find(|o| o.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Write a batch of new observations, all or nothing.
    ///
    /// Overlaps against stored observations and within the batch are checked
    /// again here. Files are staged first and only renamed into place once
    /// every one of them was written.
    pub fn commit_observations(&self, batch: &[Observation]) -> Result<(), StorageError> {
        for (i, observation) in batch.iter().enumerate() {
            let interval = observation.interval();
            let clashes_in_batch = batch[..i].iter().any(|o| {
                o.station_id == observation.station_id && o.interval().overlaps(&interval)
            });
            if clashes_in_batch
                || self.check_overlap(observation.station_id, interval)?
            {
                return Err(StorageError::Overlap(observation.station_id));
            }
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(batch.len());
        let written = batch.iter().try_for_each(|observation| {
            std::fs::create_dir_all(self.station_path(observation.station_id))?;
            let path = self.observation_path(observation.station_id, &observation.id);
            let tmp = path.with_extension("yaml.tmp");
            std::fs::write(&tmp, serde_yaml::to_string(observation)?)?;
            staged.push((tmp, path));
            Ok::<(), StorageError>(())
        });

        if let Err(e) = written {
            for (tmp, _) in &staged {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e);
        }

        let mut placed: Vec<&PathBuf> = Vec::with_capacity(staged.len());
        for (tmp, path) in &staged {
            if let Err(e) = std::fs::rename(tmp, path) {
                error!("Failed to commit observation {}: {}", path.display(), e);
                for path in placed {
                    let _ = std::fs::remove_file(path);
                }
                for (tmp, _) in &staged {
                    let _ = std::fs::remove_file(tmp);
                }
                return Err(e.into());
            }
            placed.push(path);
        }

        Ok(())
    }

    /// Overwrite an already stored observation.
    pub fn update_observation(&self, observation: &Observation) -> Result<(), StorageError> {
        let path = self.observation_path(observation.station_id, &observation.id);

        if !path.exists() {
            return Err(StorageError::NotFound(observation.id.clone()));
        }

        std::fs::write(path, serde_yaml::to_string(observation)?)?;
        Ok(())
    }

    pub fn delete_observation(&self, id: &str) -> Result<Observation, StorageError> {
        let observation = self.get_observation(id)?;
        std::fs::remove_file(self.observation_path(observation.station_id, id))?;
        Ok(observation)
    }

    fn check_overlap(
        &self,
        station: StationId,
        interval: Interval,
    ) -> Result<bool, StorageError> {
        for observation in self.get_observations(station)? {
            if observation.interval().overlaps(&interval) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn generate_id(&self, start: DateTime<Utc>) -> String {
        let uuid = uuid::Uuid::new_v4();
        let timestamp = start.format("%Y%m%dT%H%M%SZ");
        format!("{}_{}", timestamp, uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::interval::tests::iv;
    use crate::scheduler::observation::tests::observation;
    use crate::scheduler::observation::VettedStatus;
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    #[test]
    fn test_commit_and_query_bookings() {
        let (_dir, storage) = storage();
        storage
            .commit_observations(&[
                observation("b", 1, iv(11, 0, 11, 10)),
                observation("a", 1, iv(10, 0, 10, 10)),
                observation("c", 2, iv(10, 0, 10, 10)),
            ])
            .unwrap();

        let all = storage.get_observations(1).unwrap();
        assert_eq!(all.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        let bookings = storage
            .existing_bookings(1, iv(10, 5, 10, 5).start, iv(10, 50, 10, 50).start)
            .unwrap();
        assert_eq!(bookings, vec![iv(10, 0, 10, 10)]);

        assert_eq!(storage.all_observations().unwrap().len(), 3);
        assert_eq!(storage.get_observation("c").unwrap().station_id, 2);
    }

    #[test]
    fn test_overlapping_commit_writes_nothing() {
        let (_dir, storage) = storage();
        storage
            .commit_observations(&[observation("a", 1, iv(10, 0, 10, 10))])
            .unwrap();

        let result = storage.commit_observations(&[
            observation("b", 2, iv(10, 0, 10, 10)),
            observation("c", 1, iv(10, 5, 10, 20)),
        ]);
        assert!(matches!(result, Err(StorageError::Overlap(1))));
        assert!(storage.get_observations(2).unwrap().is_empty());

        let within = storage.commit_observations(&[
            observation("d", 3, iv(12, 0, 12, 10)),
            observation("e", 3, iv(12, 5, 12, 20)),
        ]);
        assert!(matches!(within, Err(StorageError::Overlap(3))));
        assert!(storage.get_observations(3).unwrap().is_empty());
    }

    #[test]
    fn test_touching_observations_are_allowed() {
        let (_dir, storage) = storage();
        storage
            .commit_observations(&[
                observation("a", 1, iv(10, 0, 10, 10)),
                observation("b", 1, iv(10, 10, 10, 20)),
            ])
            .unwrap();
        assert_eq!(storage.get_observations(1).unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let (_dir, storage) = storage();
        let mut obs = observation("a", 1, iv(10, 0, 10, 10));
        storage.commit_observations(&[obs.clone()]).unwrap();

        obs.vet(VettedStatus::Bad, "carol", obs.end);
        storage.update_observation(&obs).unwrap();
        assert_eq!(
            storage.get_observation("a").unwrap().vetted_status,
            VettedStatus::Bad
        );

        let deleted = storage.delete_observation("a").unwrap();
        assert_eq!(deleted.id, "a");
        assert!(matches!(
            storage.get_observation("a"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.update_observation(&obs),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let (dir, storage) = storage();
        storage
            .commit_observations(&[observation("a", 1, iv(10, 0, 10, 10))])
            .unwrap();
        let station_dir = dir.path().join("observations").join("1");
        std::fs::write(station_dir.join("junk.yaml"), "not: [an observation").unwrap();
        std::fs::write(station_dir.join("left.yaml.tmp"), "ignored").unwrap();

        assert_eq!(storage.get_observations(1).unwrap().len(), 1);
    }

    #[test]
    fn test_generated_ids_start_with_timestamp() {
        let (_dir, storage) = storage();
        let id = storage.generate_id(iv(10, 0, 10, 0).start);
        assert!(id.starts_with("20240301T100000Z_"));
        assert_ne!(id, storage.generate_id(iv(10, 0, 10, 0).start));
    }
}
