//! Slash separated path helpers for cluster paths.
//!
//! Cluster paths are plain strings rather than [`std::path::Path`] so they
//! behave identically on every host platform.

/// Lexically cleans a path: repeated separators collapse, `.` segments
/// vanish and `..` consumes its parent without ever climbing above the root.
/// An empty result becomes `"."` for relative input and `"/"` otherwise.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Joins two paths and cleans the result. Empty parts are ignored.
pub fn join(base: &str, sub: &str) -> String {
    match (base.is_empty(), sub.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean(sub),
        (false, true) => clean(base),
        (false, false) => clean(&format!("{base}/{sub}")),
    }
}

/// Everything but the last element of the path, cleaned.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => clean(&path[..=index]),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean("/a/b/../c"), "/a/c");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("a/../../b"), "../b");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean(""), ".");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/registry", "/docker/blobs"), "/registry/docker/blobs");
        assert_eq!(join("/registry/", "docker"), "/registry/docker");
        assert_eq!(join("/registry", "/"), "/registry");
        assert_eq!(join("/registry", "/../../etc"), "/etc");
        assert_eq!(join("", "a/b"), "a/b");
        assert_eq!(join("/a", ""), "/a");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/a/b/"), "/a/b");
        assert_eq!(parent("a"), ".");
    }
}
