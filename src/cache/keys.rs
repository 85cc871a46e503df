//! Cache key derivation
//!
//! Maps a source identifier (repository URL or local path) to a stable,
//! collision-resistant directory name. The readable part of the name is
//! for humans; uniqueness comes from a truncated SHA-256 of the full
//! identifier, so two sources that share a repository name still get
//! distinct cache entries.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::core::paths::adapt_path;
use crate::core::util::short_hash;

/// Hex digits of SHA-256 appended to URL-derived names.
const URL_SUFFIX_LEN: usize = 8;

/// Hex digits of SHA-256 appended to local-path names.
const LOCAL_SUFFIX_LEN: usize = 12;

/// Matches the owner/repo tail of a GitHub identifier, in both HTTPS
/// (`github.com/owner/repo`) and SSH (`github.com:owner/repo`) forms,
/// with an optional `.git` suffix.
static GITHUB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([^/]+)/([^/]+?)(\.git)?$").expect("Invalid GITHUB_RE regex")
});

/// Derive the cache directory name for a source URL.
///
/// GitHub URLs become `<owner>__<repo>-<hash>`; anything else becomes
/// `<last-segment>-<hash>`. The hash is the first eight hex digits of the
/// SHA-256 of the exact identifier string, which keeps `org-a/shared-lib`
/// and `org-b/shared-lib` apart even under the flat fallback.
pub fn derive_name(source_url: &str) -> String {
    let suffix = short_hash(source_url, URL_SUFFIX_LEN);

    if let Some(caps) = GITHUB_RE.captures(source_url) {
        let owner = sanitize_component(&caps[1]);
        let repo = sanitize_component(&caps[2]);
        return format!("{}__{}-{}", owner, repo, suffix);
    }

    let stem = source_url
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim_end_matches(".git");
    format!("{}-{}", sanitize_component(stem), suffix)
}

/// Derive the cache directory name for a local source directory.
///
/// The path is resolved (or absolutized if it does not exist yet) before
/// hashing, so two checkouts with the same leaf name in different parents
/// never collide.
pub fn derive_local_name(path: &Path) -> String {
    let resolved = path
        .canonicalize()
        .unwrap_or_else(|_| adapt_path(path));
    let suffix = short_hash(&resolved.to_string_lossy(), LOCAL_SUFFIX_LEN);
    let leaf = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("local__{}__{}", sanitize_component(&leaf), suffix)
}

/// Restrict a name component to `[A-Za-z0-9._-]`; everything else becomes
/// a hyphen. An empty component becomes `unnamed`.
fn sanitize_component(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
