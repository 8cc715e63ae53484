use std::path::PathBuf;

/// Process-lifetime interpreter state, threaded through the engine by
/// mutable reference rather than kept in a hidden static.
pub struct Session {
    /// Working directory in effect before the last successful `cd` to a
    /// target other than `-`. Read, never written, by `cd -`.
    pub previous_dir: Option<PathBuf>,
}

impl Session {
    pub fn new() -> Session {
        Session { previous_dir: None }
    }
}
