use std::path::PathBuf;

pub const ASSET_DIR_ENV: &str = "PM_ASSET_DIR";

/// Directory holding the sqlite database and other runtime state.
///
/// Overridable through `PM_ASSET_DIR` (tests point this at a temp dir).
pub fn asset_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ASSET_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pm-server")
}
