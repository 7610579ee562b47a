//! Well-known item ids.

/// Id of the synthetic root folder.
pub const ROOT_ID: &str = "";

/// Id of the synthetic trash folder, a direct child of root.
pub const TRASH_ID: &str = "trash";

/// Id of the singleton mode control file.
pub const MODE_ID: &str = "MODE_ID";

/// Name under which the mode file appears at the mount root.
pub const MODE_FILE_NAME: &str = ".mode";
