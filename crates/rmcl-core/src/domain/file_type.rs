use std::fmt;

/// The kind of document content a `Document` carries.
///
/// Mirrors the original `FileType` enum: `notes` is the tablet's native
/// handwriting format (no inner ZIP entry to extract), `unknown` means the
/// tail probe could not identify an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Epub,
    Notes,
    Unknown,
}

impl FileType {
    /// The inner ZIP entry extension this type extracts, if any.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            FileType::Pdf => Some("pdf"),
            FileType::Epub => Some("epub"),
            FileType::Notes | FileType::Unknown => None,
        }
    }

    /// Matches a file extension (without the leading dot) against this type.
    pub fn from_extension(ext: &str) -> Option<FileType> {
        match ext {
            "pdf" => Some(FileType::Pdf),
            "epub" => Some(FileType::Epub),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Pdf => "pdf",
            FileType::Epub => "epub",
            FileType::Notes => "notes",
            FileType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}
