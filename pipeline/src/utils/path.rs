//! Object-path derivation
//!
//! Stage outputs are derived from the input path by suffixing the basename,
//! so the same rules must work for plain filesystem paths and for
//! `s3://` / `azure://` URIs. Plain string manipulation is used instead of
//! `std::path` to keep URI schemes intact.

/// Split a path into `(stem, extension)` where the extension includes the
/// leading dot and is looked up only in the final path segment.
fn split_extension(path: &str) -> (&str, &str) {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) => path.split_at(segment_start + dot),
        None => (path, ""),
    }
}

/// Lower-cased extension of the final path segment, including the dot
pub fn file_extension(path: &str) -> String {
    split_extension(path).1.to_ascii_lowercase()
}

/// Final path segment
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map(|i| &path[i + 1..]).unwrap_or(path)
}

/// Clean-stage fragment path: `{root}_part{idx}.json`
pub fn fragment_path(source: &str, idx: usize) -> String {
    let (root, _) = split_extension(source);
    format!("{root}_part{idx}.json")
}

/// Per-stage output path: `{base}_{suffix}{ext}`
pub fn stage_output_path(input: &str, suffix: &str) -> String {
    let (base, ext) = split_extension(input);
    format!("{base}_{suffix}{ext}")
}
