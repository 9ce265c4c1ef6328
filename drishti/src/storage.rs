//! Filesystem storage for scan artifacts.
//!
//! Layout under the configured scans folder:
//!
//! ```text
//! <scans>/<scan_id>/
//! ├── scan_<scan_id>.ply   # point cloud (ASCII PLY, written once at finalization)
//! ├── <scan_id>.fab        # settings sidecar (JSON)
//! ├── color_raw/           # intermediate texture frames (deleted after finalization)
//! └── laser_raw/           # intermediate laser frames (deleted after finalization)
//! ```

use crate::core::services::ScanStorage;
use crate::core::types::PointRecord;
use crate::error::{Error, Result};
use crate::settings::Settings;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Intermediate per-frame image folders inside a scan folder
pub const IMAGE_FOLDERS: [&str; 2] = ["color_raw", "laser_raw"];

/// Scan storage rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FsScanStorage {
    root: PathBuf,
}

impl FsScanStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every artifact of `scan_id`
    pub fn scan_dir(&self, scan_id: &str) -> Result<PathBuf> {
        validate_scan_id(scan_id)?;
        Ok(self.root.join(scan_id))
    }

    pub fn point_cloud_path(&self, scan_id: &str) -> Result<PathBuf> {
        Ok(self
            .scan_dir(scan_id)?
            .join(format!("scan_{}.ply", scan_id)))
    }

    pub fn settings_path(&self, scan_id: &str) -> Result<PathBuf> {
        Ok(self.scan_dir(scan_id)?.join(format!("{}.fab", scan_id)))
    }
}

/// Scan ids become folder names, so anything that could escape the root is rejected
fn validate_scan_id(scan_id: &str) -> Result<()> {
    let valid = !scan_id.is_empty()
        && scan_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "invalid scan id '{}'",
            scan_id
        )))
    }
}

/// Write points as an ASCII PLY document
pub fn write_ply<W: Write>(out: &mut W, points: &[PointRecord]) -> Result<()> {
    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "comment generated by drishti")?;
    writeln!(out, "element vertex {}", points.len())?;
    writeln!(out, "property float x")?;
    writeln!(out, "property float y")?;
    writeln!(out, "property float z")?;
    writeln!(out, "property uchar red")?;
    writeln!(out, "property uchar green")?;
    writeln!(out, "property uchar blue")?;
    writeln!(out, "end_header")?;
    for p in points {
        writeln!(out, "{} {} {} {} {} {}", p.x, p.y, p.z, p.r, p.g, p.b)?;
    }
    Ok(())
}

impl ScanStorage for FsScanStorage {
    fn save_point_cloud(&self, scan_id: &str, points: &[PointRecord]) -> Result<PathBuf> {
        fs::create_dir_all(self.scan_dir(scan_id)?)?;
        let path = self.point_cloud_path(scan_id)?;

        let mut out = BufWriter::new(File::create(&path)?);
        write_ply(&mut out, points)?;
        out.flush()?;

        log::info!("Wrote {} points to {}", points.len(), path.display());
        Ok(path)
    }

    fn save_settings(&self, scan_id: &str, settings: &Settings) -> Result<PathBuf> {
        fs::create_dir_all(self.scan_dir(scan_id)?)?;
        let path = self.settings_path(scan_id)?;
        settings.save_to_file(&path)?;
        Ok(path)
    }

    fn delete_image_folders(&self, scan_id: &str) -> Result<()> {
        let dir = self.scan_dir(scan_id)?;
        for folder in IMAGE_FOLDERS {
            let path = dir.join(folder);
            if path.exists() {
                fs::remove_dir_all(&path)?;
                log::debug!("Removed {}", path.display());
            }
        }
        Ok(())
    }

    fn delete_scan(&self, scan_id: &str) -> Result<()> {
        let dir = self.scan_dir(scan_id)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            log::info!("Deleted scan folder {}", dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, r: u8) -> PointRecord {
        PointRecord {
            x,
            y: 1.5,
            z: -2.0,
            r,
            g: 0,
            b: 255,
        }
    }

    #[test]
    fn test_ply_header_and_body() {
        let mut buf = Vec::new();
        write_ply(&mut buf, &[point(0.5, 10), point(1.0, 20)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ply");
        assert!(lines.contains(&"element vertex 2"));
        let header_end = lines.iter().position(|l| *l == "end_header").unwrap();
        assert_eq!(lines.len() - header_end - 1, 2);
        assert_eq!(lines[header_end + 1], "0.5 1.5 -2 10 0 255");
    }

    #[test]
    fn test_save_point_cloud_creates_scan_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsScanStorage::new(dir.path());

        let path = storage
            .save_point_cloud("20240101-120000", &[point(0.0, 1)])
            .unwrap();
        assert_eq!(
            path,
            dir.path().join("20240101-120000/scan_20240101-120000.ply")
        );
        assert!(path.exists());
    }

    #[test]
    fn test_save_settings_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsScanStorage::new(dir.path());

        let path = storage
            .save_settings("20240101-120000", &Settings::default())
            .unwrap();
        assert!(path.ends_with("20240101-120000/20240101-120000.fab"));
        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_delete_image_folders_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsScanStorage::new(dir.path());
        let id = "20240101-120000";

        let scan_dir = storage.scan_dir(id).unwrap();
        for folder in IMAGE_FOLDERS {
            fs::create_dir_all(scan_dir.join(folder)).unwrap();
        }
        let ply = storage.save_point_cloud(id, &[]).unwrap();

        storage.delete_image_folders(id).unwrap();
        for folder in IMAGE_FOLDERS {
            assert!(!scan_dir.join(folder).exists());
        }
        assert!(ply.exists());
    }

    #[test]
    fn test_delete_scan() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsScanStorage::new(dir.path());
        let id = "20240101-120000";

        storage.save_point_cloud(id, &[]).unwrap();
        storage.delete_scan(id).unwrap();
        assert!(!dir.path().join(id).exists());

        // Deleting a scan that never hit the disk is fine
        storage.delete_scan("20240101-130000").unwrap();
    }

    #[test]
    fn test_rejects_path_like_scan_ids() {
        let storage = FsScanStorage::new("/tmp/scans");
        assert!(storage.scan_dir("../etc").is_err());
        assert!(storage.scan_dir("a/b").is_err());
        assert!(storage.scan_dir("").is_err());
        assert!(storage.scan_dir("20240101-120000").is_ok());
    }
}
