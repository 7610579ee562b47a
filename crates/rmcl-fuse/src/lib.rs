//! The kernel-facing FUSE adapter: synthesizes a read-mostly filesystem
//! view over an [`rmcl_graph::ItemGraph`], plus the writable `.mode`
//! control file.

mod error;
mod filesystem;
mod inode;

pub use error::FuseError;
pub use filesystem::RmclFs;
pub use inode::{InodeTable, ROOT_INODE};
