use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::unistd;

use crate::error::Error;

/// Duplicates of the process's standard descriptors, taken before a stage
/// redirects or runs a built-in and restored when the guard drops. This is
/// what keeps one command's redirection from leaking into the next,
/// whichever way the stage exits.
pub struct StdioSnapshot {
    stdin_copy: OwnedFd,
    stdout_copy: OwnedFd,
}

impl StdioSnapshot {
    pub fn capture() -> Result<StdioSnapshot, Error> {
        Ok(StdioSnapshot {
            stdin_copy: dup_owned(libc::STDIN_FILENO)?,
            stdout_copy: dup_owned(libc::STDOUT_FILENO)?,
        })
    }
}

impl Drop for StdioSnapshot {
    fn drop(&mut self) {
        // Anything still buffered belongs to the redirected target, so it
        // must reach fd 1 before the descriptor is swapped back.
        let _ = io::stdout().flush();
        let _ = unistd::dup2(self.stdin_copy.as_raw_fd(), libc::STDIN_FILENO);
        let _ = unistd::dup2(self.stdout_copy.as_raw_fd(), libc::STDOUT_FILENO);
    }
}

fn dup_owned(fd: RawFd) -> Result<OwnedFd, Error> {
    let copy = unistd::dup(fd).map_err(Error::DescriptorSnapshot)?;
    // dup hands back a freshly allocated descriptor; nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

/// Redirection targets pulled out of an argument list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// Scan the argument list once, left to right. The first `<` and the first
/// `>` are consumed together with their filename tokens, shifting nothing
/// else; a later duplicate of an already-consumed operator stays in the
/// list as an ordinary argument.
pub fn extract_redirections(args: &mut Vec<String>) -> Result<RedirectionSpec, Error> {
    let mut spec = RedirectionSpec::default();
    let mut i = 0;
    while i < args.len() {
        let (slot, op) = match args[i].as_str() {
            "<" if spec.input.is_none() => (&mut spec.input, "<"),
            ">" if spec.output.is_none() => (&mut spec.output, ">"),
            _ => {
                i += 1;
                continue;
            }
        };
        if i + 1 >= args.len() {
            return Err(Error::MissingRedirectionTarget(op));
        }
        let target = args.remove(i + 1);
        args.remove(i);
        *slot = Some(target);
    }
    Ok(spec)
}

/// Open the extracted targets and rebind descriptors 0/1 onto them. The
/// opened files are dropped on return; the rebound descriptors are the only
/// references that remain. Failures here are fatal to the calling process
/// under the engine's error policy.
pub fn apply_redirections(spec: &RedirectionSpec) -> Result<(), Error> {
    if let Some(name) = &spec.input {
        let file =
            File::open(name).map_err(|e| Error::RedirectionFailure(name.clone(), e))?;
        rebind(&file, libc::STDIN_FILENO, name)?;
    }
    if let Some(name) = &spec.output {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o640)
            .open(name)
            .map_err(|e| Error::RedirectionFailure(name.clone(), e))?;
        rebind(&file, libc::STDOUT_FILENO, name)?;
    }
    Ok(())
}

fn rebind(file: &File, fd: RawFd, name: &str) -> Result<(), Error> {
    unistd::dup2(file.as_raw_fd(), fd).map_err(|errno| {
        Error::RedirectionFailure(name.to_owned(), io::Error::from_raw_os_error(errno as i32))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn input_operator_and_filename_are_consumed() {
        let mut list = args(&["wc", "-w", "<", "data.txt"]);
        let spec = extract_redirections(&mut list).unwrap();
        assert_eq!(spec.input.as_deref(), Some("data.txt"));
        assert_eq!(spec.output, None);
        assert_eq!(list, args(&["wc", "-w"]));
    }

    #[test]
    fn output_operator_and_filename_are_consumed() {
        let mut list = args(&["echo", "hi", ">", "out.txt"]);
        let spec = extract_redirections(&mut list).unwrap();
        assert_eq!(spec.output.as_deref(), Some("out.txt"));
        assert_eq!(list, args(&["echo", "hi"]));
    }

    #[test]
    fn both_kinds_may_appear_in_one_stage() {
        let mut list = args(&["sort", "<", "in.txt", ">", "out.txt", "-r"]);
        let spec = extract_redirections(&mut list).unwrap();
        assert_eq!(spec.input.as_deref(), Some("in.txt"));
        assert_eq!(spec.output.as_deref(), Some("out.txt"));
        assert_eq!(list, args(&["sort", "-r"]));
    }

    #[test]
    fn duplicate_operator_stays_in_the_list() {
        let mut list = args(&["echo", "a", ">", "one", ">", "two"]);
        let spec = extract_redirections(&mut list).unwrap();
        assert_eq!(spec.output.as_deref(), Some("one"));
        assert_eq!(list, args(&["echo", "a", ">", "two"]));
    }

    #[test]
    fn trailing_operator_is_an_error() {
        let mut list = args(&["echo", "hi", ">"]);
        let err = extract_redirections(&mut list).unwrap_err();
        assert!(matches!(err, Error::MissingRedirectionTarget(">")));
    }
}
