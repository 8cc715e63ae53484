use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};

/// Fixed binary search path, consulted in order by both `which` and the
/// external-command launcher. Deliberately not the environment's `PATH`.
pub const SEARCH_DIRS: [&str; 3] = ["/usr/local/bin", "/usr/bin", "/bin"];

pub fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

/// Resolve a command name to an executable path. A name containing `/` is
/// taken literally; anything else is looked up in `SEARCH_DIRS`, first
/// executable match wins.
pub fn resolve(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    SEARCH_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| is_executable(candidate))
}
