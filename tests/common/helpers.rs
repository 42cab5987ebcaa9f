use haul::download::ResumeMarker;
use haul::progress::{ProgressBarOpts, StyleOptions};
use haul::retry::RetryPolicy;
use haul::DownloaderBuilder;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

// Common test constants
pub const TEST_DOMAIN: &str = "http://domain.com/file.zip";
pub const TEST_USER_AGENT: &str = "haul-test-agent";

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Creates a temporary file with the given content
pub fn create_temp_file(dir: &Path, filename: &str, content: &[u8]) -> PathBuf {
    let file_path = dir.join(filename);
    fs::write(&file_path, content).expect("Failed to write temporary file");
    file_path
}

/// Creates test file content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Asserts that a file has the expected size
pub fn assert_file_size(path: &Path, expected_size: u64) {
    let metadata = fs::metadata(path).expect("Failed to get file metadata");
    assert_eq!(
        metadata.len(),
        expected_size,
        "File size mismatch at path: {:?}",
        path
    );
}

/// Asserts that a file holds exactly `content`
pub fn assert_file_content(path: &Path, content: &[u8]) {
    let on_disk = fs::read(path).expect("Failed to read file");
    assert_eq!(on_disk.len(), content.len(), "length mismatch at {:?}", path);
    assert!(on_disk == content, "content mismatch at {:?}", path);
}

/// Write a partial file and the marker that vouches for it.
pub fn seed_partial(destination: &Path, source: &str, content: &[u8], total: Option<u64>) {
    fs::write(destination, content).expect("Failed to write partial file");
    let marker = ResumeMarker::new(source, content.len() as u64, total);
    fs::write(
        haul::download::marker_path(destination),
        serde_json::to_vec(&marker).expect("encode marker"),
    )
    .expect("Failed to write marker");
}

// === Retry Helpers ===

/// Retries fast enough for tests.
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
        multiplier: 2.0,
        max_delay: Duration::from_millis(50),
        jitter_fraction: 0.0,
    }
}

// === HTTP Configuration Helpers ===

/// Creates test headers with common user agent
pub fn create_test_headers() -> HeaderMap {
    create_test_headers_with_agent(TEST_USER_AGENT)
}

/// Creates test headers with custom user agent
pub fn create_test_headers_with_agent(agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(agent).expect("Invalid header value"),
    );
    headers
}

// === Progress Bar Helpers ===

/// Creates default test progress bar options
pub fn create_test_progress_opts() -> ProgressBarOpts {
    ProgressBarOpts::new(None, None, true, false)
}

/// Creates custom progress bar options with template and chars
pub fn create_custom_progress_opts(template: &str, chars: &str) -> ProgressBarOpts {
    ProgressBarOpts::new(
        Some(template.to_string()),
        Some(chars.to_string()),
        true,
        false,
    )
}

/// Creates default test style options
pub fn create_test_style_options() -> StyleOptions {
    StyleOptions::new(create_test_progress_opts(), ProgressBarOpts::with_pip_style())
}

/// Asserts that progress bar options are configured correctly
pub fn assert_progress_opts_enabled(opts: &ProgressBarOpts) {
    // Without a terminal indicatif reports every bar as hidden; only a
    // disabled bar has no length.
    assert_eq!(opts.to_progress_bar(100).length(), Some(100), "Progress bar should be enabled");
}

/// Asserts that progress bar options are disabled
pub fn assert_progress_opts_disabled(opts: &ProgressBarOpts) {
    assert_eq!(opts.to_progress_bar(100).length(), None, "Progress bar should be disabled");
}

// === Downloader Builder Helpers ===

/// A hidden downloader writing into `temp_dir` with fast retries.
pub fn create_test_downloader_builder(temp_dir: &Path) -> DownloaderBuilder {
    DownloaderBuilder::hidden()
        .directory(temp_dir.to_path_buf())
        .concurrent_downloads(2)
        .retry_policy(fast_retry_policy(3))
        .timeout(Duration::from_secs(5))
}
