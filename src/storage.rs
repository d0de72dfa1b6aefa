//! File backend for the keystore.

use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{KeystoreError, Result};

/// Reads and writes the encrypted keystore file at a fixed path.
///
/// Writes are crash-safe: data goes to a randomly named temporary file in the
/// same directory, is fsynced, then atomically renamed over the target. After
/// a crash either the old or the new file is present, never a partial write.
#[derive(Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    /// Loads the entire keystore file into memory.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| self.map_io(e))
    }

    /// Atomically replaces the keystore file with `data`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.map_io(e))?;
        }

        let tmp_path = self.random_tmp_path()?;

        // create_new so a concurrent writer cannot share the temp file
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .map_err(|e| self.map_io(e))?;

        let write = tmp_file
            .write_all(data)
            .and_then(|()| tmp_file.sync_all());
        drop(tmp_file);

        if let Err(e) = write.and_then(|()| self.atomic_replace(&tmp_path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.map_io(e));
        }

        // fsync the directory so the rename itself is durable
        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent).map_err(|e| self.map_io(e))?;
            dir.sync_all().map_err(|e| self.map_io(e))?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_io(&self, e: io::Error) -> KeystoreError {
        if e.kind() == io::ErrorKind::PermissionDenied {
            KeystoreError::PermissionDenied(self.path.clone())
        } else {
            KeystoreError::Io(e)
        }
    }

    /// Unique temporary path in the target's directory: `name.tmp.<randomhex>`.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf)
            .map_err(|_| KeystoreError::Io(io::Error::other("OS random generator unavailable")))?;

        let suffix = hex::encode(buf);
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "keystore".to_string());

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }

    /// Atomic on Windows via `ReplaceFileW` with write-through.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        // ReplaceFileW requires an existing target; first write is a plain rename
        if !self.path.exists() {
            return fs::rename(tmp_path, &self.path);
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// On Unix, `rename()` is atomic when both paths share a filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        fs::rename(tmp_path, &self.path)
    }
}
