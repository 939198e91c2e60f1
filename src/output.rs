//! Run directories and manifests for the command-line tools.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Current UTC time, RFC 3339.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Create `<output_root>/<UTC timestamp>`, adding a `-NN` suffix when that
/// directory already exists.
pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_root)?;

    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut run_dir = output_root.join(&stamp);
    let mut suffix = 1_u32;
    while run_dir.exists() {
        run_dir = output_root.join(format!("{stamp}-{suffix:02}"));
        suffix += 1;
    }

    fs::create_dir_all(&run_dir)?;
    log::debug!("created run directory {}", run_dir.display());
    Ok(run_dir)
}

/// Pretty-print `manifest` to `<run_dir>/manifest.json`.
pub fn write_manifest_json<T: Serialize>(run_dir: &Path, manifest: &T) -> Result<PathBuf> {
    let path = run_dir.join(MANIFEST_FILE);
    fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Stub {
        files: Vec<&'static str>,
        created_utc: String,
    }

    #[test]
    fn run_dirs_get_a_suffix_on_collision() {
        let root = tempfile::tempdir().unwrap();
        let a = create_timestamped_output_dir(root.path()).unwrap();
        let b = create_timestamped_output_dir(root.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn creates_missing_output_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("runs").join("plan");
        let run = create_timestamped_output_dir(&nested).unwrap();
        assert!(run.starts_with(&nested));
    }

    #[test]
    fn manifest_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Stub {
            files: vec!["a.csv", MANIFEST_FILE],
            created_utc: utc_timestamp(),
        };
        let path = write_manifest_json(dir.path(), &manifest).unwrap();
        assert_eq!(path.file_name().unwrap(), MANIFEST_FILE);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"files\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["files"][1], "manifest.json");
        let created = value["created_utc"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
    }
}
