//! Tiered configuration.
//!
//! Tiers, lowest priority first, merged field-by-field:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/task-sync/config.yaml`
//! 3. **User** - `~/.task-sync/config.yaml`
//! 4. **Environment** - see below
//!
//! Command-line flags are applied by the binary on top of all tiers.
//!
//! ## Environment Variables
//! - `TASK_SYNC_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `TASK_SYNC_DB_PATH` - Database path
//! - `TASK_SYNC_PORT` - HTTP port
//! - `TASK_SYNC_USER_DIR` - User config dir (default: `~/.task-sync`)
//! - `TASK_SYNC_PROJECT_DIR` - Project config dir (default: `./task-sync`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, apply_overrides};
pub use merge::deep_merge;
pub use types::*;
