//! Object naming: sanitization and remote key conventions.
//!
//! The sanitized file name is the join key between the upload path and the
//! face-recognition path: it becomes both the final segment of the stored
//! blob key and the external image id attached to every indexed face. Both
//! sides must therefore call [`sanitize_object_name`] on the same input and
//! get byte-identical output.
//!
//! Sanitization is not injective ("a b.jpg" and "a_b.jpg" collapse to the
//! same string). Key reconstruction at search time uses the external image
//! id verbatim, so lookups stay exact; only the reversed display name is
//! lossy.

/// Characters kept as-is by [`sanitize_object_name`]. Everything else maps
/// to an underscore. The set matches what the face-recognition service
/// accepts in an external image id.
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':')
}

/// Sanitize a file name for use as a blob key segment and external image id.
///
/// Disallowed characters become underscores and runs of underscores collapse
/// to one. A trailing ` (n)` duplicate suffix before the extension survives
/// as `_n_` and is restored by [`display_name_from_external_id`].
pub fn sanitize_object_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for c in name.trim().chars() {
        let mapped = if is_allowed(c) { c } else { '_' };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }
    out
}

/// Recover a human-readable name from an external image id.
///
/// Reverses [`sanitize_object_name`]: a trailing `_n_` before the extension
/// becomes ` (n)` and remaining underscores become spaces. Lossy for names
/// that legitimately contained underscores.
pub fn display_name_from_external_id(external_id: &str) -> String {
    let (stem, ext) = match external_id.rfind('.') {
        Some(pos) => (&external_id[..pos], &external_id[pos..]),
        None => (external_id, ""),
    };

    let restored = match split_duplicate_suffix(stem) {
        Some((base, n)) => format!("{} ({})", base.replace('_', " "), n),
        None => stem.replace('_', " "),
    };

    format!("{}{}", restored, ext)
}

/// Split a sanitized stem ending in `_n_` into (base, n).
fn split_duplicate_suffix(stem: &str) -> Option<(&str, &str)> {
    let inner = stem.strip_suffix('_')?;
    let digits_start = inner.rfind(|c: char| !c.is_ascii_digit())? + 1;
    let digits = &inner[digits_start..];
    if digits.is_empty() {
        return None;
    }
    let base = inner[..digits_start].strip_suffix('_')?;
    Some((base, digits))
}

/// Remote key for a shared event image.
///
/// `events/shared/{event_id}/images/{millis}-{index}-{sanitized_name}`.
/// The `{millis}-{index}` prefix makes concurrent re-uploads collision
/// resistant without coordination; the sanitized name keeps the key
/// joinable with the face index.
pub fn shared_image_key(event_id: &str, millis: i64, batch_index: usize, name: &str) -> String {
    format!(
        "{}{}-{}-{}",
        shared_image_prefix(event_id),
        millis,
        batch_index,
        sanitize_object_name(name)
    )
}

/// Listing prefix for all shared images of an event.
pub fn shared_image_prefix(event_id: &str) -> String {
    format!("events/shared/{}/images/", event_id)
}

/// Remote key for an attendee's selfie.
///
/// `users/{user_id}/selfies/selfie-{millis}-{sanitized_name}`.
pub fn selfie_key(user_id: &str, millis: i64, original_name: &str) -> String {
    format!(
        "users/{}/selfies/selfie-{}-{}",
        user_id,
        millis,
        sanitize_object_name(original_name)
    )
}

/// External image id for a stored blob key: its final path segment.
///
/// Returns `None` when the key has no segment (empty or trailing slash).
pub fn external_id_from_key(key: &str) -> Option<&str> {
    key.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Original-name portion of a stored key segment, with the
/// `{millis}-{index}-` prefix stripped. Used to detect remote duplicates
/// of a newly submitted file name.
pub fn stored_name_from_segment(segment: &str) -> Option<&str> {
    let rest = segment.split_once('-')?.1;
    let (index, name) = rest.split_once('-')?;
    if index.bytes().all(|b| b.is_ascii_digit()) {
        Some(name)
    } else {
        None
    }
}
