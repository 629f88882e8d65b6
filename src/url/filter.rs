use url::Url;

/// Path extensions that never lead to indexable HTML
const BINARY_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".tar", ".gz", ".jpg",
    ".jpeg", ".png", ".gif", ".bmp", ".mp4", ".avi", ".mov", ".mp3", ".wav",
];

/// Checks whether a normalized URL is worth offering to the frontier
///
/// Rejects non-HTTP(S) URLs, URLs without a host, and paths that end in a
/// known binary or office-document extension.
pub fn is_crawlable(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    if url.host_str().map_or(true, str::is_empty) {
        return false;
    }

    let path = url.path().to_lowercase();
    !BINARY_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
