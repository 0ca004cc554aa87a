#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use racedata_core::{EngineConfig, RaceEngine};
use tempfile::TempDir;

pub const OFFICIAL: &str = "05_Results_Race1_Official.csv";
pub const PROVISIONAL: &str = "03_Provisional_Results_Race2.CSV";
pub const BEST_LAPS: &str = "99_Best_10_Laps_By_Driver_Race1.csv";

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../racedata-parser/tests/data")
        .join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", path.display(), err))
}

/// A throwaway `<root>/<TRACK>/<race>/` tree of timing exports.
pub struct DataTree {
    root: TempDir,
}

impl DataTree {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create temp data root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn write(&self, track: &str, race: &str, name: &str, content: &str) -> PathBuf {
        let folder = self.root.path().join(track).join(race);
        fs::create_dir_all(&folder).expect("create race folder");
        let path = folder.join(name);
        fs::write(&path, content).expect("write export");
        path
    }

    pub fn copy_fixture(&self, track: &str, race: &str, name: &str) -> PathBuf {
        self.write(track, race, name, &fixture(name))
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::with_data_root(self.root.path())
    }

    pub fn engine(&self) -> RaceEngine {
        RaceEngine::new(self.config())
    }
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value should be present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
