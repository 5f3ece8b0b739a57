use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;
use twox_hash::XxHash64;

/// Cheap fingerprint of a buffer, used to skip rescans when an edit is a no-op.
pub(crate) fn compute_content_hash(content: &str) -> u64 {
    let mut hasher = XxHash64::default();
    content.hash(&mut hasher);
    hasher.finish()
}

pub(crate) fn is_test_script(uri: &Url) -> bool {
    uri.path().to_ascii_lowercase().ends_with(".tst")
}

/// Environment directory for a script: `<script dir>/<name>` where the name comes
/// from the `-- Environment:` comment. Falls back to the bare name for non-file URIs.
pub(crate) fn environment_path(uri: &Url, environment_name: &str) -> String {
    match uri.to_file_path().ok().as_deref().and_then(Path::parent) {
        Some(dir) => dir.join(environment_name).to_string_lossy().into_owned(),
        None => environment_name.to_string(),
    }
}

pub(crate) fn file_path(uri: &Url) -> Option<PathBuf> {
    uri.to_file_path().ok()
}
