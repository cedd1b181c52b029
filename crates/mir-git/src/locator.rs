//! Repository references and their resolution to a git-dir/worktree pair.

use std::any::Any;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Explicit git directory and worktree locations.
///
/// Used as-is: no `~` expansion or other normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitEnv {
    /// Path passed as `--git-dir`.
    pub gitdir: PathBuf,
    /// Path passed as `--work-tree`.
    pub worktree: PathBuf,
}

impl GitEnv {
    /// Create a new explicit environment.
    pub fn new(gitdir: impl Into<PathBuf>, worktree: impl Into<PathBuf>) -> Self {
        Self {
            gitdir: gitdir.into(),
            worktree: worktree.into(),
        }
    }
}

/// A caller-supplied way of naming a repository.
///
/// # Examples
///
/// ```
/// use mir_git::{GitEnv, RepositoryRef};
///
/// let by_path = RepositoryRef::from("/srv/repo");
/// let explicit = RepositoryRef::from(GitEnv::new("/srv/repo.git", "/srv/checkout"));
/// assert_ne!(by_path, explicit);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepositoryRef {
    /// A worktree path whose git directory is `<path>/.git`.
    ///
    /// A leading `~` is expanded to the user's home directory.
    Path(PathBuf),

    /// Explicit git directory and worktree.
    Env(GitEnv),
}

/// A resolved repository location, ready to be passed to git.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Value for `--git-dir`.
    pub gitdir: PathBuf,
    /// Value for `--work-tree`.
    pub worktree: PathBuf,
}

impl RepositoryRef {
    /// Build a reference from a dynamically typed value.
    ///
    /// Accepts `String`, `&str`, `PathBuf`, `&Path`, [`GitEnv`] and
    /// `RepositoryRef` itself.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedRef`] for any other type.
    pub fn from_value<T: Any>(value: &T) -> Result<Self> {
        let any = value as &dyn Any;
        if let Some(s) = any.downcast_ref::<String>() {
            Ok(Self::from(s.as_str()))
        } else if let Some(s) = any.downcast_ref::<&str>() {
            Ok(Self::from(*s))
        } else if let Some(p) = any.downcast_ref::<PathBuf>() {
            Ok(Self::from(p.as_path()))
        } else if let Some(p) = any.downcast_ref::<&Path>() {
            Ok(Self::from(*p))
        } else if let Some(env) = any.downcast_ref::<GitEnv>() {
            Ok(Self::Env(env.clone()))
        } else if let Some(r) = any.downcast_ref::<Self>() {
            Ok(r.clone())
        } else {
            Err(Error::UnsupportedRef {
                type_name: std::any::type_name::<T>(),
            })
        }
    }

    /// Resolve to a concrete location, expanding `~` with the home directory.
    ///
    /// # Errors
    /// Returns [`Error::NoHomeDir`] if the path starts with `~` and the home
    /// directory cannot be determined.
    pub fn resolve(&self) -> Result<Location> {
        self.resolve_with_home(dirs::home_dir().as_deref())
    }

    /// Resolve using an explicitly supplied home directory.
    ///
    /// # Errors
    /// Returns [`Error::NoHomeDir`] if the path starts with `~` and `home`
    /// is `None`.
    pub fn resolve_with_home(&self, home: Option<&Path>) -> Result<Location> {
        match self {
            Self::Path(path) => {
                let worktree = expand_tilde(path, home)?;
                Ok(Location {
                    gitdir: worktree.join(".git"),
                    worktree,
                })
            }
            Self::Env(env) => Ok(Location {
                gitdir: env.gitdir.clone(),
                worktree: env.worktree.clone(),
            }),
        }
    }
}

/// Expand a leading `~` component. `~user` forms are left alone.
fn expand_tilde(path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let home = home.ok_or_else(|| Error::NoHomeDir {
                path: path.to_path_buf(),
            })?;
            let rest = components.as_path();
            if rest.as_os_str().is_empty() {
                Ok(home.to_path_buf())
            } else {
                Ok(home.join(rest))
            }
        }
        _ => Ok(path.to_path_buf()),
    }
}

impl From<&str> for RepositoryRef {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for RepositoryRef {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for RepositoryRef {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for RepositoryRef {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for RepositoryRef {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<GitEnv> for RepositoryRef {
    fn from(env: GitEnv) -> Self {
        Self::Env(env)
    }
}

impl From<&Self> for RepositoryRef {
    fn from(r: &Self) -> Self {
        r.clone()
    }
}
