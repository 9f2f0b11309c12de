//! Working-directory artifacts for ddreloc.
//!
//! - `dt.cc` / `dt.ct` differential-time files (hypoDD layout, string ids)
//! - JSON Lines stage log
//! - `manifest.json` with the parameter hash used for restart checks
//! - exclusive lock file for the working directory

pub mod dtfile;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod writer;

pub use dtfile::{read_dt_cc, read_dt_ct, write_dt_cc, write_dt_ct};
pub use error::{PersistenceError, PersistenceResult};
pub use lock::{WorkdirLock, LOCK_FILE_NAME};
pub use manifest::{parameter_hash, ManifestCounts, RunManifest};
pub use writer::{read_json_lines, JsonLinesWriter};
