//! Rendition filenames
//!
//! `photo.jpg` of image 42 rendered with cache key `2b6a1f3e` to JPEG is
//! stored as `images/42/photo.2b6a1f3e.jpg`. The base name is shortened as
//! needed so the filename never exceeds the configured ceiling. Each image
//! gets its own directory, so sources sharing a basename never collide.

use crate::error::RenditionError;

/// Longest filename a rendition may have
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 80;

/// Base used when the source basename is empty
const FALLBACK_BASE: &str = "image";

/// Source basename with its extension stripped
///
/// A name without a dot (or only a leading one) is kept whole.
pub fn base_name(source_file: &str) -> &str {
    let basename = source_file.rsplit('/').next().unwrap_or(source_file);
    match basename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => basename,
    }
}

/// Build `<base>.<cache_key>.<extension>` within `max_len` characters
pub fn output_filename(
    source_file: &str,
    cache_key: &str,
    extension: &str,
    max_len: usize,
) -> Result<String, RenditionError> {
    let suffix = format!(".{}.{}", cache_key, extension);
    let suffix_len = suffix.chars().count();

    // Report the suffix only
    if suffix_len >= max_len {
        return Err(RenditionError::OutputPathTooLong {
            filename: suffix,
            max_len,
        });
    }

    let mut base = base_name(source_file);
    if base.is_empty() {
        base = FALLBACK_BASE;
    }

    let budget = max_len - suffix_len;
    let truncated: String = base.chars().take(budget).collect();
    Ok(truncated + &suffix)
}

/// Storage name of a rendition file of image `image_id` inside `dir`
pub fn rendition_path(dir: &str, image_id: u64, filename: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("{}/{}", image_id, filename)
    } else {
        format!("{}/{}/{}", dir, image_id, filename)
    }
}
