use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Failed checksum")]
    ChecksumMismatch,

    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),

    #[error("malformed LZMA properties prefix")]
    MalformedLzmaProperties,

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
