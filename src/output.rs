//! Files written next to each other for one FQDN: key, request and printout.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("{0:?} already exists, use --force to overwrite it")]
    Exists(PathBuf),

    #[error("{0:?} can't be used as a file name")]
    InvalidName(String),

    #[error("can't write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    PrivateKey,
    Request,
    Printout,
}

impl Artifact {
    pub fn extension(self) -> &'static str {
        match self {
            Self::PrivateKey => "key",
            Self::Request => "req",
            Self::Printout => "pdf",
        }
    }

    fn is_secret(self) -> bool {
        self == Self::PrivateKey
    }
}

#[derive(Debug, Clone)]
pub struct OutputDir {
    dir: PathBuf,
    force: bool,
}

impl OutputDir {
    pub fn new(dir: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            dir: dir.into(),
            force,
        }
    }

    pub fn path(
        &self,
        fqdn: &str,
        artifact: Artifact,
    ) -> Result<PathBuf, OutputError> {
        if fqdn.is_empty()
            || fqdn.starts_with('.')
            || fqdn.contains(['/', '\\'])
        {
            return Err(OutputError::InvalidName(fqdn.to_owned()));
        }
        Ok(self.dir.join(format!("{fqdn}.{}", artifact.extension())))
    }

    /// Fails if any of `artifacts` would overwrite a file without `force`.
    pub fn check_free(
        &self,
        fqdn: &str,
        artifacts: &[Artifact],
    ) -> Result<(), OutputError> {
        for artifact in artifacts {
            let path = self.path(fqdn, *artifact)?;
            if path.exists() && !self.force {
                return Err(OutputError::Exists(path));
            }
        }
        Ok(())
    }

    /// Writes `contents` through a temporary file that is renamed into place,
    /// so a failure never leaves a truncated file behind.
    pub fn write(
        &self,
        fqdn: &str,
        artifact: Artifact,
        contents: &[u8],
    ) -> Result<PathBuf, OutputError> {
        self.check_free(fqdn, &[artifact])?;
        let path = self.path(fqdn, artifact)?;
        let io_err = |source: io::Error| OutputError::Io {
            path: path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        file.write_all(contents).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        // Temporary files are created private, which is right for keys only.
        if !artifact.is_secret() {
            make_world_readable(file.path()).map_err(io_err)?;
        }
        file.persist(&path).map_err(|err| io_err(err.error))?;

        info!(path = ?path, "wrote {}", artifact.extension());
        Ok(path)
    }
}

#[cfg(unix)]
fn make_world_readable(path: &Path) -> io::Result<()> {
    use std::{fs, os::unix::fs::PermissionsExt};

    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_world_readable(_path: &Path) -> io::Result<()> {
    Ok(())
}
