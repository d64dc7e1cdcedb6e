//! Mapping request paths onto the file system.

use std::path::{Path, PathBuf};


/// Checks that a request path only names things below its root.
///
/// Segments are separated by `/` or `\`. Parent references, NUL bytes and
/// drive or stream separators are rejected; empty and `.` segments are
/// harmless and get dropped by [`combine`].
pub fn is_valid(relative: &str) -> bool {
    segments(relative).all(|segment| {
        segment != ".."
            && !segment.contains('\0')
            && !segment.contains(':')
    })
}

/// Joins `relative` onto `root`.
///
/// Returns `None` if the relative path tries to leave the root. An empty
/// relative path yields the root itself.
pub fn combine(root: &Path, relative: &str) -> Option<PathBuf> {
    if !is_valid(relative) {
        return None
    }

    let mut path = root.to_path_buf();
    for segment in segments(relative).filter(|s| *s != ".") {
        path.push(segment);
    }
    Some(path)
}

/// The canonical spelling of a relative path: segments joined by `/`,
/// without empty or `.` segments. `None` for invalid paths.
///
/// Authorization and routing key on this form, so `user\edit.html` and
/// `/user/./edit.html/` both end up as `user/edit.html`.
pub fn normalize(relative: &str) -> Option<String> {
    if !is_valid(relative) {
        return None
    }

    let segments: Vec<&str> = segments(relative).filter(|s| *s != ".").collect();
    Some(segments.join("/"))
}

fn segments(relative: &str) -> impl Iterator<Item=&str> {
    relative
        .split(|c| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty())
}
