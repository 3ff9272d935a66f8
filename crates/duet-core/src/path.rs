//! Path validation for static file serving
//!
//! Request paths come straight off the wire, so every component is checked
//! before anything under the public directory is touched.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;
use crate::{MAX_FILENAME_LEN, MAX_PATH_LEN};

/// Resolve a URL path (e.g. `/css/app.css`) to a file inside `base`.
///
/// Query strings and fragments are stripped and the rest percent-decoded
/// before validation, `/` maps to `index.html`, and any `..`, absolute or
/// prefixed component is rejected. The result is not checked for existence;
/// see [`safe_real_path`] for that.
pub fn resolve_request_path(base: &Path, url_path: &str) -> Result<PathBuf, PathError> {
    let raw = url_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let path = urlencoding::decode(raw)
        .map_err(|_| PathError::Traversal("path is not valid UTF-8 after decoding".into()))?;

    if path.contains('\0') {
        return Err(PathError::Traversal("path contains null byte".into()));
    }

    if path.len() > MAX_PATH_LEN {
        return Err(PathError::Traversal(format!(
            "path too long: {} bytes (max {})",
            path.len(),
            MAX_PATH_LEN
        )));
    }

    let relative = path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{}index.html", relative)
    } else {
        relative.to_string()
    };

    let mut result = base.to_path_buf();

    for component in Path::new(&relative).components() {
        match component {
            Component::Normal(name) => {
                let name_str = name.to_string_lossy();
                if name_str.len() > MAX_FILENAME_LEN {
                    return Err(PathError::Traversal(format!(
                        "filename too long: {} bytes (max {})",
                        name_str.len(),
                        MAX_FILENAME_LEN
                    )));
                }
                result.push(name);
            }
            Component::ParentDir => {
                return Err(PathError::Traversal(
                    "parent directory (..) not allowed".into(),
                ));
            }
            Component::CurDir => {}
            Component::Prefix(_) | Component::RootDir => {
                return Err(PathError::Traversal("absolute paths not allowed".into()));
            }
        }
    }

    if !result.starts_with(base) {
        return Err(PathError::Traversal("path escapes base directory".into()));
    }

    Ok(result)
}

/// Canonicalize `path` and make sure symlinks don't lead outside `base`.
pub fn safe_real_path(base: &Path, path: &Path) -> Result<PathBuf, PathError> {
    let canonical_base = base.canonicalize().map_err(|_| PathError::NotFound)?;
    let canonical_path = path.canonicalize().map_err(|_| PathError::NotFound)?;

    if !canonical_path.starts_with(&canonical_base) {
        return Err(PathError::Traversal(
            "symlink escapes public directory".into(),
        ));
    }

    Ok(canonical_path)
}

/// Content type for a served file, by extension
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_maps_to_index() {
        let base = Path::new("/srv/public");
        assert_eq!(
            resolve_request_path(base, "/").unwrap(),
            PathBuf::from("/srv/public/index.html")
        );
        assert_eq!(
            resolve_request_path(base, "/docs/").unwrap(),
            PathBuf::from("/srv/public/docs/index.html")
        );
    }

    #[test]
    fn test_query_stripped() {
        let base = Path::new("/srv/public");
        assert_eq!(
            resolve_request_path(base, "/app.js?v=3#top").unwrap(),
            PathBuf::from("/srv/public/app.js")
        );
    }

    #[test]
    fn test_percent_decoded() {
        let base = Path::new("/srv/public");
        assert_eq!(
            resolve_request_path(base, "/my%20file.txt").unwrap(),
            PathBuf::from("/srv/public/my file.txt")
        );
        assert_eq!(
            resolve_request_path(base, "/caf%C3%A9.html?x=%20").unwrap(),
            PathBuf::from("/srv/public/café.html")
        );
    }

    #[test]
    fn test_encoded_traversal_rejected() {
        let base = Path::new("/srv/public");
        assert!(matches!(
            resolve_request_path(base, "/%2e%2e/etc/passwd"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(
            resolve_request_path(base, "/css%2F..%2F..%2Fsecret"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(
            resolve_request_path(base, "/a%00b"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(
            resolve_request_path(base, "/bad%FF.txt"),
            Err(PathError::Traversal(_))
        ));
    }

    #[test]
    fn test_traversal_rejected() {
        let base = Path::new("/srv/public");
        assert!(matches!(
            resolve_request_path(base, "/../etc/passwd"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(
            resolve_request_path(base, "/css/../../secret"),
            Err(PathError::Traversal(_))
        ));
        assert!(resolve_request_path(base, "/a\0b").is_err());
    }

    #[test]
    fn test_safe_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html></html>").unwrap();

        let real = safe_real_path(dir.path(), &file).unwrap();
        assert!(real.ends_with("index.html"));

        let missing = dir.path().join("missing.html");
        assert_eq!(safe_real_path(dir.path(), &missing), Err(PathError::NotFound));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("app.JS")), "application/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
