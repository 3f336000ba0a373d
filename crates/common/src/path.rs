// Document path canonicalization: NFC normalization, traversal rejection, 512 char max.
//
// A normalized path doubles as the remote record name, so both sides of a
// sync must agree on it byte for byte.

use std::path::{Component, Path};

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),

    #[error("path is not inside the vault root: {0}")]
    OutsideRoot(String),
}

/// Normalize a vault-relative document path.
///
/// Rules:
/// - Apply Unicode NFC normalization (macOS hands out decomposed names)
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip leading and trailing `/`
/// - Reject `.` and `..` components, null bytes and empty paths
/// - Enforce max 512 character limit (after normalization)
pub fn normalize_path(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let normalized: String = input.nfc().collect();
    let unified = normalized.replace('\\', "/");
    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        if *component == "." || *component == ".." {
            return Err(PathError::Traversal((*component).to_string()));
        }
        if component.trim().is_empty() {
            return Err(PathError::InvalidComponent(
                "(whitespace-only component)".to_string(),
            ));
        }
    }

    let result = components.join("/");

    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

/// Express `path` relative to `root` and normalize it.
pub fn relative_document_path(root: &Path, path: &Path) -> Result<String, PathError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot(path.display().to_string()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => return Err(PathError::Traversal(".".to_string())),
            Component::ParentDir => return Err(PathError::Traversal("..".to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::OutsideRoot(path.display().to_string()))
            }
        }
    }

    normalize_path(&parts.join("/"))
}

/// Last segment of a normalized path, used as the uploaded blob's filename.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_simple_path() {
        assert_eq!(normalize_path("notes/readme.md").unwrap(), "notes/readme.md");
    }

    #[test]
    fn test_backslash_to_forward() {
        assert_eq!(normalize_path("notes\\daily\\file.md").unwrap(), "notes/daily/file.md");
    }

    #[test]
    fn test_strip_leading_trailing_slash() {
        assert_eq!(normalize_path("/notes/file.md/").unwrap(), "notes/file.md");
    }

    #[test]
    fn test_collapse_consecutive_slashes() {
        assert_eq!(normalize_path("notes///nested//file.md").unwrap(), "notes/nested/file.md");
    }

    #[test]
    fn test_unicode_decomposed_matches_composed() {
        let decomposed = normalize_path("notes/caf\u{0065}\u{0301}.md").unwrap();
        let composed = normalize_path("notes/caf\u{00e9}.md").unwrap();
        assert_eq!(decomposed, composed);
    }

    #[test]
    fn test_nfc_keeps_ligatures() {
        // NFC (unlike NFKC) leaves compatibility characters alone, so two
        // distinct files never collapse onto one record name.
        assert_eq!(normalize_path("notes/\u{FB01}le.md").unwrap(), "notes/\u{FB01}le.md");
    }

    #[test]
    fn test_reject_dotdot() {
        assert_eq!(
            normalize_path("notes/../etc/passwd"),
            Err(PathError::Traversal("..".to_string()))
        );
    }

    #[test]
    fn test_reject_dot_component() {
        assert_eq!(normalize_path("notes/./file.md"), Err(PathError::Traversal(".".to_string())));
    }

    #[test]
    fn test_reject_empty() {
        assert_eq!(normalize_path(""), Err(PathError::Empty));
        assert_eq!(normalize_path("///"), Err(PathError::Empty));
    }

    #[test]
    fn test_reject_null_byte() {
        assert_eq!(normalize_path("notes/file\0.md"), Err(PathError::NullByte));
    }

    #[test]
    fn test_reject_whitespace_component() {
        assert!(matches!(normalize_path("notes/  /file.md"), Err(PathError::InvalidComponent(_))));
    }

    #[test]
    fn test_max_length() {
        assert!(normalize_path(&"a".repeat(512)).is_ok());
        assert_eq!(normalize_path(&"a".repeat(513)), Err(PathError::TooLong));
    }

    #[test]
    fn test_relative_document_path() {
        let root = PathBuf::from("/vault");
        let path = PathBuf::from("/vault/projects/plan.md");
        assert_eq!(relative_document_path(&root, &path).unwrap(), "projects/plan.md");
    }

    #[test]
    fn test_relative_document_path_outside_root() {
        let root = PathBuf::from("/vault");
        let path = PathBuf::from("/elsewhere/plan.md");
        assert!(matches!(relative_document_path(&root, &path), Err(PathError::OutsideRoot(_))));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("projects/2024/plan.md"), "plan.md");
        assert_eq!(file_name("plan.md"), "plan.md");
    }
}
