//! Path resolution and containment for asset requests
//!
//! Every client-supplied path is joined onto the configured base directory,
//! normalized lexically, and checked for containment before the filesystem is
//! touched. Containment is component-wise, so a base of `/data/out` never
//! matches `/data/out-evil`. Paths that pass the lexical check are then
//! canonicalized so that symlinks pointing outside the base are rejected too.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::error::AssetError;
use super::mime::content_type_for;

/// Validated, canonical root directory for asset serving
#[derive(Clone, Debug)]
pub struct BaseDirectory {
    root: PathBuf,
}

impl BaseDirectory {
    /// Validate that `path` is an existing, readable directory and canonicalize it
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let invalid = |reason: String| AssetError::InvalidBaseDirectory {
            path: path.display().to_string(),
            reason,
        };

        if path.as_os_str().is_empty() {
            return Err(invalid("path is empty".to_string()));
        }

        let root = path.canonicalize().map_err(|e| invalid(e.to_string()))?;
        if !root.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        std::fs::read_dir(&root).map_err(|e| invalid(format!("not readable: {}", e)))?;

        Ok(Self { root })
    }

    /// Canonical path of the base directory
    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// Untrusted asset request, as received from the `path` query parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    relative_path: String,
}

impl AssetRequest {
    /// Build a request from the raw query value
    ///
    /// Missing or empty values and values containing NUL are rejected here,
    /// before any path handling.
    pub fn new(relative_path: Option<&str>) -> Result<Self, AssetError> {
        let relative_path = match relative_path {
            Some(p) if !p.is_empty() => p,
            _ => return Err(AssetError::MissingPath),
        };

        if relative_path.contains('\0') {
            return Err(AssetError::InvalidPath {
                reason: "path contains a NUL byte".to_string(),
            });
        }

        Ok(Self {
            relative_path: relative_path.to_string(),
        })
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

/// Result of lexical resolution against the base directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized absolute path
    pub absolute_path: PathBuf,
    /// Whether `absolute_path` is the base directory or a descendant of it
    pub within_base: bool,
}

/// An opened asset, ready to be streamed
#[derive(Debug)]
pub struct AssetResponse {
    /// Open handle to the file
    pub file: File,
    /// Inferred MIME type
    pub content_type: &'static str,
    /// File size in bytes
    pub content_length: u64,
}

impl AssetResponse {
    /// Read the whole file into memory
    pub async fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.content_length as usize);
        self.file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

/// Lexically normalize a path, resolving `.` and `..` without touching the filesystem
///
/// `..` at the root stays at the root. Leading `..` on a relative path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Path of `candidate` relative to `base`, if `candidate` is `base` or lies beneath it
///
/// Both paths are expected to be normalized. Returns `None` when the relation
/// would need a parent segment or is absolute.
pub fn relative_to(base: &Path, candidate: &Path) -> Option<PathBuf> {
    let rel = candidate.strip_prefix(base).ok()?;
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || rel.is_absolute() {
        return None;
    }
    Some(rel.to_path_buf())
}

/// Whether normalized `candidate` is contained in `base`
pub fn is_contained(base: &Path, candidate: &Path) -> bool {
    relative_to(base, candidate).is_some()
}

/// Resolves untrusted relative paths against a fixed base directory
#[derive(Clone, Debug)]
pub struct AssetResolver {
    base: BaseDirectory,
}

impl AssetResolver {
    pub fn new(base: BaseDirectory) -> Self {
        Self { base }
    }

    /// Canonical base directory
    pub fn base(&self) -> &Path {
        self.base.path()
    }

    /// Lexically resolve a request. Never touches the filesystem.
    pub fn resolve(&self, request: &AssetRequest) -> ResolvedPath {
        let absolute_path = normalize(&self.base().join(request.relative_path()));
        let within_base = is_contained(self.base(), &absolute_path);
        ResolvedPath {
            absolute_path,
            within_base,
        }
    }

    /// Validate, resolve, and open the asset named by an untrusted query value
    pub async fn resolve_and_serve(
        &self,
        relative_path: Option<&str>,
    ) -> Result<AssetResponse, AssetError> {
        let request = AssetRequest::new(relative_path)?;
        self.open(&request).await
    }

    /// Open a validated request
    pub async fn open(&self, request: &AssetRequest) -> Result<AssetResponse, AssetError> {
        let resolved = self.resolve(request);
        if !resolved.within_base {
            return Err(self.forbidden(request, &resolved.absolute_path));
        }

        let not_found = || AssetError::NotFound {
            requested: request.relative_path().to_string(),
        };

        let canonical = match tokio::fs::canonicalize(&resolved.absolute_path).await {
            Ok(path) => path,
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => return Err(AssetError::Io(e)),
        };

        // A symlink inside the base may still point elsewhere
        if !is_contained(self.base(), &canonical) {
            return Err(self.forbidden(request, &canonical));
        }

        let metadata = match tokio::fs::metadata(&canonical).await {
            Ok(m) => m,
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => return Err(AssetError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(not_found());
        }

        let file = match File::open(&canonical).await {
            Ok(f) => f,
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => {
                tracing::error!(path = %canonical.display(), "Failed to open asset: {}", e);
                return Err(AssetError::Io(e));
            }
        };

        tracing::debug!(
            requested = request.relative_path(),
            bytes = metadata.len(),
            "Serving asset"
        );

        Ok(AssetResponse {
            file,
            content_type: content_type_for(&canonical),
            content_length: metadata.len(),
        })
    }

    fn forbidden(&self, request: &AssetRequest, resolved: &Path) -> AssetError {
        tracing::warn!(
            target: "security",
            requested = request.relative_path(),
            resolved = %resolved.display(),
            base = %self.base().display(),
            "Blocked path traversal attempt"
        );
        AssetError::Forbidden {
            requested: request.relative_path().to_string(),
        }
    }
}

fn is_missing(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    // ENOTDIR: a path component is a regular file
    cfg!(unix) && err.raw_os_error() == Some(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/b/./c/../d")), PathBuf::from("/a/b/d"));
        assert_eq!(normalize(Path::new("/a/b/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("./.")), PathBuf::new());
    }

    #[test]
    fn test_relative_to_is_component_wise() {
        let base = Path::new("/data/out");
        assert_eq!(relative_to(base, Path::new("/data/out")), Some(PathBuf::new()));
        assert_eq!(
            relative_to(base, Path::new("/data/out/featuremaps/x.png")),
            Some(PathBuf::from("featuremaps/x.png"))
        );
        assert_eq!(relative_to(base, Path::new("/data/out-evil/x")), None);
        assert_eq!(relative_to(base, Path::new("/data/outx")), None);
        assert_eq!(relative_to(base, Path::new("/data")), None);
        assert_eq!(relative_to(base, Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(AssetRequest::new(None), Err(AssetError::MissingPath)));
        assert!(matches!(AssetRequest::new(Some("")), Err(AssetError::MissingPath)));
        assert!(matches!(
            AssetRequest::new(Some("a\0b.png")),
            Err(AssetError::InvalidPath { .. })
        ));
        let request = AssetRequest::new(Some("featuremaps/a.png")).unwrap();
        assert_eq!(request.relative_path(), "featuremaps/a.png");
    }

    #[test]
    fn test_base_directory_rejects_missing_and_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(BaseDirectory::new(temp.path()).is_ok());
        assert!(matches!(
            BaseDirectory::new(temp.path().join("missing")),
            Err(AssetError::InvalidBaseDirectory { .. })
        ));
        assert!(matches!(
            BaseDirectory::new(&file),
            Err(AssetError::InvalidBaseDirectory { .. })
        ));
        assert!(matches!(
            BaseDirectory::new(""),
            Err(AssetError::InvalidBaseDirectory { .. })
        ));
    }
}
