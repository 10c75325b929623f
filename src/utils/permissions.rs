use std::fs;
use std::io;
use std::path::Path;

/// Cross-platform file permissions handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePermissions {
    mode: u32,
}

impl FilePermissions {
    /// Create permissions from a raw mode value
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        Self { mode }
    }

    /// Get the raw mode value
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// Capture permissions from already-read metadata
    #[must_use]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Self::from_mode(metadata.permissions().mode() & 0o7777)
        }

        #[cfg(not(unix))]
        {
            // Read-only flag is the only bit we can carry over
            let mode = if metadata.permissions().readonly() {
                0o444
            } else {
                0o644
            };
            Self::from_mode(mode)
        }
    }

    /// Apply permissions to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the permission change
    pub fn apply_to_path(&self, path: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.mode))?;
        }

        #[cfg(not(unix))]
        {
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_readonly((self.mode & 0o200) == 0);
            fs::set_permissions(path, permissions)?;
        }

        Ok(())
    }
}

impl Default for FilePermissions {
    fn default() -> Self {
        Self::from_mode(0o644)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_capture_and_apply() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("script.sh");
        let dst = temp.path().join("copy.sh");
        fs::write(&src, "#!/bin/sh\n").unwrap();
        fs::write(&dst, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();

        let perms = FilePermissions::from_metadata(&fs::metadata(&src).unwrap());
        assert_eq!(perms.mode(), 0o750);

        perms.apply_to_path(&dst).unwrap();
        let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(FilePermissions::default().mode(), 0o644);
    }
}
