//! Socket path conventions.

use std::env;
use std::path::PathBuf;

/// Socket path a netcore server named `program` listens on:
/// `<temp dir>/<program>.sock`.
#[must_use]
pub fn socket_path(program: &str) -> PathBuf {
    env::temp_dir().join(format!("{program}.sock"))
}
