//! Helpers shared by the in-crate test modules.

use std::path::Path;

/// Write an executable `/bin/sh` script standing in for `ollama`.
pub(crate) fn stub_runner(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("stub-runner");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}
