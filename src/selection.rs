/*!
 * Active selection (procedure + metric) and its persistence between runs
 */

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{Result, MedrankError};
use crate::config::MedrankConfig;
use crate::data_types::{ProcedureCode, RankingMetric};

/// Procedure and metric the rankings are derived for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub procedure: ProcedureCode,
    #[serde(default)]
    pub metric: RankingMetric,
}

impl Selection {
    pub fn new(procedure: ProcedureCode, metric: RankingMetric) -> Self {
        Self { procedure, metric }
    }

    /// Defaults taken from configuration
    pub fn from_config(config: &MedrankConfig) -> Self {
        Self {
            procedure: ProcedureCode::new(config.default_procedure.as_str()),
            metric: config.default_metric,
        }
    }
}

/// On-disk form of the last selection
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedSelection {
    #[serde(flatten)]
    selection: Selection,
    saved_at: DateTime<Utc>,
}

/// TOML file remembering the last selection
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the platform data directory
    ///
    /// `~/.local/share/medrank/selection.toml` on Linux
    pub fn default_location() -> Option<Self> {
        default_selection_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored selection, `None` if nothing was saved yet
    pub fn read(&self) -> Result<Option<Selection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let saved: SavedSelection = toml::from_str(&contents).map_err(|e| MedrankError::Configuration {
            message: format!("Failed to parse saved selection {}: {}", self.path.display(), e),
            suggestion: Some("Delete the file to reset the remembered selection".to_string()),
        })?;
        debug!("Restored selection saved at {}", saved.saved_at);
        Ok(Some(saved.selection))
    }

    /// Stored selection, or `fallback` when nothing usable is stored
    pub fn load_or(&self, fallback: Selection) -> Selection {
        match self.read() {
            Ok(Some(selection)) => selection,
            Ok(None) => fallback,
            Err(e) => {
                warn!("Ignoring saved selection: {}", e);
                fallback
            }
        }
    }

    /// Persist a selection, creating parent directories as needed
    pub fn save(&self, selection: &Selection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let saved = SavedSelection {
            selection: selection.clone(),
            saved_at: Utc::now(),
        };
        let contents = toml::to_string_pretty(&saved).map_err(|e| MedrankError::Configuration {
            message: format!("Failed to serialize selection: {}", e),
            suggestion: None,
        })?;
        std::fs::write(&self.path, contents)?;
        debug!("Saved selection to {}", self.path.display());
        Ok(())
    }

    /// Forget the stored selection; returns whether anything was removed
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        Ok(true)
    }
}

fn default_selection_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "medrank")
        .map(|dirs| dirs.data_dir().join("selection.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path().join("nested").join("selection.toml"));
        assert_eq!(store.read().unwrap(), None);

        let selection = Selection::new(ProcedureCode::hip(), RankingMetric::PaymentAmount);
        store.save(&selection).unwrap();
        assert_eq!(store.read().unwrap(), Some(selection));

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains("procedure = \"27130\""));
        assert!(contents.contains("metric = \"payment\""));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        std::fs::write(&path, "metric = \"volume\"\nsaved_at = \"yesterday\"").unwrap();
        let store = SelectionStore::new(&path);
        assert!(store.read().is_err());
        assert_eq!(store.load_or(Selection::default()), Selection::default());
    }
}
