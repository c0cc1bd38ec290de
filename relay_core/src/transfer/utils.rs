use crate::transfer::constants::{DEFAULT_MIME_TYPE, MAX_FILENAME_LENGTH};
use std::path::Path;
use tokio::fs::{File, OpenOptions};

/// Extension to MIME type lookup (lowercase extensions)
const MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("7z", "application/x-7z-compressed"),
    ("rar", "application/vnd.rar"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
];

/// Percentage of `bytes_sent` over `total_bytes`, rounded and capped at 100.
/// An empty file counts as fully sent.
pub fn compute_progress(bytes_sent: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 100;
    }
    let percent = (bytes_sent as f64 / total_bytes as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Name shown to the receiver: the stored id minus its leading unique token
pub fn display_name(file_id: &str) -> &str {
    file_id
        .split_once('-')
        .map(|(_, rest)| rest)
        .unwrap_or(file_id)
}

/// MIME type guessed from the file extension
pub fn mime_type_for(file_name: &str) -> &'static str {
    let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();

    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Create a file with secure permissions (0o600 on Unix)
pub async fn create_secure_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path).await
}

/// True if `file_id` is a bare file name that cannot leave the upload directory
pub fn is_plain_file_id(file_id: &str) -> bool {
    !file_id.is_empty() && sanitize_file_name(file_id) == file_id
}

/// Sanitize file name to prevent path traversal attacks and ensure safety
pub fn sanitize_file_name(file_name: &str) -> String {
    // 1. Split by both / and \ to handle cross-platform paths
    let file_name = file_name
        .split(|c| c == '/' || c == '\\')
        .last()
        .unwrap_or("unknown_file");

    if file_name.is_empty() {
        return "unknown_file".to_string();
    }

    // 2. Drop control characters
    let mut clean_name: String = file_name.chars().filter(|c| !c.is_control()).collect();

    // 3. Windows reserved names
    let reserved_names = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if reserved_names
        .iter()
        .any(|&r| clean_name.eq_ignore_ascii_case(r))
    {
        return "unknown_file".to_string();
    }

    // 4. "." and ".."
    if clean_name == ".." || clean_name == "." || clean_name.trim().is_empty() {
        return "unknown_file".to_string();
    }

    // 5. Truncate, keeping a short extension
    if clean_name.len() > MAX_FILENAME_LENGTH {
        let ext_len = clean_name
            .rfind('.')
            .map(|idx| clean_name.len() - idx)
            .filter(|&len| len < 20);

        match ext_len {
            Some(ext_len) => {
                let idx = clean_name.len() - ext_len;
                let ext = clean_name[idx..].to_string();
                let mut base = clean_name[..idx].to_string();
                truncate_at_boundary(&mut base, MAX_FILENAME_LENGTH - ext_len);
                base.push_str(&ext);
                clean_name = base;
            }
            None => truncate_at_boundary(&mut clean_name, MAX_FILENAME_LENGTH),
        }
    }

    clean_name
}

fn truncate_at_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut cutoff = max_len;
    while !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s.truncate(cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(compute_progress(0, 200_000), 0);
        assert_eq!(compute_progress(65_536, 200_000), 33);
        assert_eq!(compute_progress(131_072, 200_000), 66);
        assert_eq!(compute_progress(199_999, 200_000), 100);
        assert_eq!(compute_progress(200_000, 200_000), 100);
    }

    #[test]
    fn test_progress_bounds() {
        assert_eq!(compute_progress(500, 100), 100);
        assert_eq!(compute_progress(0, 0), 100);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let total = 1_000_003;
        let mut last = 0;
        for sent in (0..=total).step_by(4096) {
            let p = compute_progress(sent, total);
            assert!(p >= last);
            assert!(p <= 100);
            last = p;
        }
    }

    #[test]
    fn test_display_name_strips_first_token() {
        assert_eq!(display_name("1699999999999-42-photo.png"), "42-photo.png");
        assert_eq!(display_name("abc-report.pdf"), "report.pdf");
        assert_eq!(display_name("noprefix.txt"), "noprefix.txt");
    }

    #[test]
    fn test_mime_type_lookup() {
        assert_eq!(mime_type_for("report.pdf"), "application/pdf");
        assert_eq!(mime_type_for("PHOTO.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("archive.tar.gz"), "application/gzip");
        assert_eq!(mime_type_for("data.unknownext"), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for("Makefile"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_plain_file_id() {
        assert!(is_plain_file_id("abc-report.pdf"));
        assert!(!is_plain_file_id("../etc/passwd"));
        assert!(!is_plain_file_id("dir/file.txt"));
        assert!(!is_plain_file_id(".."));
        assert!(!is_plain_file_id(""));
    }

    #[test]
    fn test_sanitize_file_name_basic() {
        assert_eq!(sanitize_file_name("normal_file.txt"), "normal_file.txt");
        assert_eq!(sanitize_file_name("path/to/file.txt"), "file.txt");
        assert_eq!(sanitize_file_name("C:\\Windows\\System32\\calc.exe"), "calc.exe");
    }

    #[test]
    fn test_sanitize_file_name_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("folder\\../file.txt"), "file.txt");
        assert_eq!(sanitize_file_name(".."), "unknown_file");
        assert_eq!(sanitize_file_name("/"), "unknown_file");
    }

    #[test]
    fn test_sanitize_file_name_reserved() {
        assert_eq!(sanitize_file_name("con"), "unknown_file");
        assert_eq!(sanitize_file_name("concert.txt"), "concert.txt");
    }

    #[test]
    fn test_sanitize_file_name_unicode_truncate() {
        // 🦀 is 4 bytes
        let mut long_unicode = "🦀".repeat(100);
        long_unicode.push_str(".txt");

        let sanitized = sanitize_file_name(&long_unicode);
        assert!(sanitized.len() <= MAX_FILENAME_LENGTH);
        assert!(sanitized.ends_with(".txt"));
        let base = sanitized.trim_end_matches(".txt");
        assert_eq!(base.chars().last(), Some('🦀'));
    }

    #[tokio::test]
    async fn test_create_secure_file_permissions() {
        let file_path =
            std::env::temp_dir().join(format!("relay_secure_test_{}.txt", uuid::Uuid::new_v4()));

        let _file = create_secure_file(&file_path)
            .await
            .expect("Failed to create secure file");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(&file_path).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }

        let _ = tokio::fs::remove_file(&file_path).await;
    }
}
