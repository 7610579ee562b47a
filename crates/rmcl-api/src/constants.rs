//! Wire constants, grounded in `rmcl/const.py`.

pub const USER_AGENT: &str = "rmcl/0.1";

pub const DEVICE_DESC: &str = "desktop-linux";

pub const DEVICE_TOKEN_URL: &str =
    "https://webapp-production-dot-remarkable-production.appspot.com/token/json/2/device/new";

pub const USER_TOKEN_URL: &str =
    "https://webapp-production-dot-remarkable-production.appspot.com/token/json/2/user/new";

pub const STORAGE_BASE_URL: &str =
    "https://document-storage-production-dot-remarkable-production.appspot.com";

/// Size of the tail range requested by `get_file_details` (~100 KiB).
pub const NBYTES: u64 = 1024 * 100;
