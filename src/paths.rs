//! XDG-compliant path resolution for artdoc.

use std::ffi::OsString;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(artdoc::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(artdoc::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for artdoc.
#[derive(Debug, Clone)]
pub struct ArtdocPaths {
    /// `$XDG_CONFIG_HOME/artdoc/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/artdoc/`
    pub data_dir: PathBuf,
    /// `$XDG_RUNTIME_DIR/artdoc/`, or `run/` under `data_dir`
    pub runtime_dir: PathBuf,
}

impl ArtdocPaths {
    /// Resolve from the XDG environment.
    ///
    /// Without `XDG_RUNTIME_DIR` the PID file lives under the data dir.
    pub fn resolve() -> PathResult<Self> {
        Self::from_env(|var| std::env::var_os(var))
    }

    fn from_env(env: impl Fn(&str) -> Option<OsString>) -> PathResult<Self> {
        let home = env("HOME").map(PathBuf::from).ok_or(PathError::NoHome)?;
        let xdg = |var: &str, fallback: &str| {
            env(var)
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(fallback))
                .join("artdoc")
        };

        let data_dir = xdg("XDG_DATA_HOME", ".local/share");
        let runtime_dir = match env("XDG_RUNTIME_DIR") {
            Some(dir) => PathBuf::from(dir).join("artdoc"),
            None => data_dir.join("run"),
        };
        Ok(Self {
            config_dir: xdg("XDG_CONFIG_HOME", ".config"),
            data_dir,
            runtime_dir,
        })
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.runtime_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Rule base used when nothing else is configured.
    pub fn default_knowledge_base(&self) -> PathBuf {
        self.data_dir.join("knowledge_base.csv")
    }

    /// PID file written by a running artdocd.
    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join("artdocd.pid")
    }
}
