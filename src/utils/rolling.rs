//! Size-rotated log file
//!
//! `RollingFile` is the writer behind the file logger. Once the active file
//! would grow past `max_bytes` it is renamed to `<path>.1`, older backups
//! shift up by one, and anything beyond `max_backups` is deleted. With no
//! backups kept the active file is simply truncated.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_BYTES: u64 = 128 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// When to rotate and how many old files to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub max_bytes: u64,
    pub max_backups: usize,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    rotation: Rotation,
    file: File,
    written: u64,
}

impl RollingFile {
    /// Opens `path` for appending, creating missing parent directories.
    pub fn open(path: impl Into<PathBuf>, rotation: Rotation) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            rotation,
            file,
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.<n>`
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.rotation.max_backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            let oldest = self.backup_path(self.rotation.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.rotation.max_backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = append(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A record larger than the limit still gets a file of its own.
        if self.written > 0 && self.written + buf.len() as u64 > self.rotation.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max_backups: usize) -> Rotation {
        Rotation {
            max_bytes: 32,
            max_backups,
        }
    }

    #[test]
    fn test_rotates_and_keeps_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("tcpcat.log");
        let mut file = RollingFile::open(&path, small(2)).unwrap();

        for i in 0..4 {
            let record = format!("record number {:02} padded out\n", i);
            file.write_all(record.as_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "record number 03 padded out\n"
        );
        assert_eq!(
            fs::read_to_string(file.backup_path(1)).unwrap(),
            "record number 02 padded out\n"
        );
        assert_eq!(
            fs::read_to_string(file.backup_path(2)).unwrap(),
            "record number 01 padded out\n"
        );
        assert!(!file.backup_path(3).exists());
    }

    #[test]
    fn test_no_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcpcat.log");
        let mut file = RollingFile::open(&path, small(0)).unwrap();

        file.write_all(b"first record, long enough\n").unwrap();
        file.write_all(b"second record, long enough\n").unwrap();
        file.flush().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "second record, long enough\n"
        );
        assert!(!file.backup_path(1).exists());
    }

    #[test]
    fn test_reopen_counts_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcpcat.log");
        fs::write(&path, "x".repeat(30)).unwrap();

        let mut file = RollingFile::open(&path, small(1)).unwrap();
        assert_eq!(file.path(), path.as_path());
        file.write_all(b"pushes it over\n").unwrap();
        file.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "pushes it over\n");
        assert_eq!(fs::read_to_string(file.backup_path(1)).unwrap(), "x".repeat(30));
    }
}
