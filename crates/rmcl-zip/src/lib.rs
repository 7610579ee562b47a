//! Hand-rolled ZIP parsing for the two access patterns the content pipeline
//! needs that a general-purpose ZIP crate does not support well: recovering
//! filename/size metadata from a truncated stream, and parsing
//! central-directory records out of an arbitrary tail byte range that was
//! never seeked into from a full archive.
//!
//! Grounded in the original `rmapy/zipstream.py` (local headers) and
//! `rmcl/zipdir.py` (central directory).

mod central_directory;
mod error;
mod local_header;

pub use central_directory::CentralDirectoryEntry;
pub use error::ZipError;
pub use local_header::LocalFileEntry;
