use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::predict::elements::OrbitalElements;
use crate::predict::error::PredictError;

/// Keeps the latest element set per satellite, read from a directory of
/// `.tle`/`.txt` files.
pub struct TleLoader {
    tle_dir: PathBuf,
    satellites: HashMap<u32, OrbitalElements>,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self {
            tle_dir,
            satellites: HashMap::new(),
        }
    }

    /// Load all TLE files from the directory, replacing what was loaded
    /// before. Returns how many element sets are new or changed.
    pub fn load_all(&mut self) -> Result<usize, PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        let mut loaded = HashMap::new();

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.tle_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "tle" || ext == "txt")
                    .unwrap_or(false)
            })
            .collect();
        // Later files win for duplicate satellites.
        paths.sort();

        for path in paths {
            match parse_tle_file(&path) {
                Ok(entries) => {
                    for elements in entries {
                        loaded.insert(elements.satellite_id, elements);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read TLE file {}: {}", path.display(), e);
                    // Continue with other files
                }
            }
        }

        let changed = loaded
            .iter()
            .filter(|(id, elements)| {
                self.satellites
                    .get(id)
                    .map(|old| old.line1 != elements.line1)
                    .unwrap_or(true)
            })
            .count();

        self.satellites = loaded;
        Ok(changed)
    }

    pub fn get(&self, satellite_id: u32) -> Result<&OrbitalElements, PredictError> {
        self.satellites
            .get(&satellite_id)
            .ok_or(PredictError::ElementsNotFound(satellite_id))
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    #[cfg(test)]
    pub fn insert(&mut self, elements: OrbitalElements) {
        self.satellites.insert(elements.satellite_id, elements);
    }
}

/// Parse a single TLE file (may contain multiple satellites)
fn parse_tle_file(path: &Path) -> Result<Vec<OrbitalElements>, PredictError> {
    let content = fs::read_to_string(path)?;
    let filename = path.file_name().unwrap_or_default().to_string_lossy();

    let mut results = Vec::new();
    for (name, line1, line2) in parse_multi_tle(&content) {
        match OrbitalElements::new(name.unwrap_or_default(), line1, line2) {
            Ok(elements) => results.push(elements),
            Err(e) => log::warn!("Skipping entry in {}: {}", filename, e),
        }
    }

    Ok(results)
}

/// Parse multi-satellite TLE content
pub fn parse_multi_tle(content: &str) -> Vec<(Option<&str>, &str, &str)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            // 2-line TLE (no name)
            result.push((None, lines[i], lines[i + 1]));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            // 3-line TLE (with name)
            result.push((Some(lines[i]), lines[i + 1], lines[i + 2]));
            i += 3;
        } else {
            i += 1; // Skip unknown line
        }
    }

    result
}
