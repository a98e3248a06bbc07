//! File helpers for the ingestion command.
//!
//! Only plain text is read here. Formats that need a parser (PDF, DOCX, ...)
//! are rejected so an extraction step can run first.

use std::fs;
use std::io::Read;
use std::path::Path;

/// Extensions that require a dedicated extractor before ingestion.
const EXTRACTION_REQUIRED: &[&str] = &["pdf", "doc", "docx", "odt", "rtf", "epub"];

/// Extensions read as plain text without sniffing.
const PLAIN_TEXT: &[&str] = &[
    "txt", "text", "md", "markdown", "rst", "adoc", "org", "csv", "tsv", "log", "html", "htm",
    "xml", "json", "yaml", "yml", "toml",
];

/// Check if a file can be ingested as plain text.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if EXTRACTION_REQUIRED.contains(&ext.as_str()) {
            return false;
        }
        if PLAIN_TEXT.contains(&ext.as_str()) {
            return true;
        }
    }

    // Unknown extension: sniff the first bytes for NULs
    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            return n == 0 || !buffer[..n].contains(&0);
        }
    }

    false
}

/// Read file content with a size limit.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// File name recorded in chunk metadata.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
