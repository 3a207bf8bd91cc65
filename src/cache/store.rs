//! Durable key/value storage with named sections
//!
//! `FileStore` keeps each section as a JSON object in `<dir>/<section>.json`
//! and rewrites the section file on every `set`. `MemoryStore` implements the
//! same interface without touching the disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;

/// Errors raised by the persistent store
///
/// Kept separate from fetch errors so callers can tell "the remote had no
/// data" apart from "we got data but could not record it".
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A mutation could not be made durable
    #[error("Failed to persist section '{section}': {reason}")]
    WriteFailed { section: String, reason: String },

    /// Stored data could not be read back or parsed
    #[error("Corrupt data in section '{section}': {reason}")]
    ReadCorrupt { section: String, reason: String },
}

/// Durable key/value store with named sections
///
/// `set` must be durable before it returns.
pub trait SectionStore {
    /// Creates the section if it does not exist yet
    fn ensure_section(&mut self, section: &str) -> Result<(), PersistenceError>;

    /// Reads a value; `None` if the section or key is absent
    fn get(&self, section: &str, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Writes a value and flushes it
    fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Number of keys in a section
    fn len(&self, section: &str) -> Result<usize, PersistenceError>;
}

type Section = BTreeMap<String, String>;

/// File-backed store, one JSON document per section
#[derive(Debug)]
pub struct FileStore {
    /// Directory where section files are stored
    dir: PathBuf,
    /// Loaded sections, mirrored to disk on every write
    sections: HashMap<String, Section>,
}

impl FileStore {
    /// Default store directory, if one can be determined
    ///
    /// Uses `~/.local/share/ygoprice/` on Linux, or the platform equivalent.
    pub fn default_dir() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "ygoprice")?;
        Some(project_dirs.data_dir().to_path_buf())
    }

    /// Opens a store in a custom directory
    ///
    /// Nothing is read or created until a section is ensured.
    pub fn open(dir: PathBuf) -> Self {
        Self {
            dir,
            sections: HashMap::new(),
        }
    }

    fn section_path(&self, section: &str) -> PathBuf {
        self.dir.join(format!("{}.json", section))
    }

    fn load_section(&self, section: &str) -> Result<Option<Section>, PersistenceError> {
        let path = self.section_path(section);
        if !path.exists() {
            return Ok(None);
        }

        let corrupt = |reason: String| PersistenceError::ReadCorrupt {
            section: section.to_string(),
            reason,
        };
        let content = fs::read_to_string(&path)
            .map_err(|e| corrupt(format!("{}: {}", path.display(), e)))?;
        let parsed = serde_json::from_str(&content)
            .map_err(|e| corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Some(parsed))
    }

    /// Writes a section to disk via a synced temp file and a rename
    fn flush_section(&self, section: &str, data: &Section) -> Result<(), PersistenceError> {
        let write_failed = |e: std::io::Error| PersistenceError::WriteFailed {
            section: section.to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(write_failed)?;

        let json = serde_json::to_string_pretty(data).map_err(|e| {
            PersistenceError::WriteFailed {
                section: section.to_string(),
                reason: e.to_string(),
            }
        })?;

        let path = self.section_path(section);
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(write_failed)?;
        file.write_all(json.as_bytes()).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        fs::rename(&tmp_path, &path).map_err(write_failed)?;

        log::trace!("Flushed section '{}' ({} keys)", section, data.len());
        Ok(())
    }
}

impl SectionStore for FileStore {
    fn ensure_section(&mut self, section: &str) -> Result<(), PersistenceError> {
        if self.sections.contains_key(section) {
            return Ok(());
        }

        let data = match self.load_section(section)? {
            Some(data) => {
                log::debug!("Loaded section '{}' with {} entries", section, data.len());
                data
            }
            None => {
                let data = Section::new();
                self.flush_section(section, &data)?;
                log::debug!("Created section '{}'", section);
                data
            }
        };

        self.sections.insert(section.to_string(), data);
        Ok(())
    }

    fn get(&self, section: &str, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .sections
            .get(section)
            .and_then(|data| data.get(key))
            .cloned())
    }

    fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.ensure_section(section)?;

        let mut updated = self.sections.get(section).cloned().unwrap_or_default();
        updated.insert(key.to_string(), value.to_string());

        // Memory only changes once the disk does
        self.flush_section(section, &updated)?;
        self.sections.insert(section.to_string(), updated);
        Ok(())
    }

    fn len(&self, section: &str) -> Result<usize, PersistenceError> {
        Ok(self.sections.get(section).map_or(0, BTreeMap::len))
    }
}

/// In-memory store for ephemeral sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sections: HashMap<String, Section>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SectionStore for MemoryStore {
    fn ensure_section(&mut self, section: &str) -> Result<(), PersistenceError> {
        self.sections.entry(section.to_string()).or_default();
        Ok(())
    }

    fn get(&self, section: &str, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .sections
            .get(section)
            .and_then(|data| data.get(key))
            .cloned())
    }

    fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn len(&self, section: &str) -> Result<usize, PersistenceError> {
        Ok(self.sections.get(section).map_or(0, BTreeMap::len))
    }
}
