//! Domain types: the remote wire shape and the small enums layered on it.

mod file_type;
mod ids;
mod mode;
mod remote_metadata;

pub use file_type::FileType;
pub use ids::{MODE_FILE_NAME, MODE_ID, ROOT_ID, TRASH_ID};
pub use mode::Mode;
pub use remote_metadata::{RemoteItemType, RemoteMetadata};
