use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStringExt;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::builtin;
use crate::error::Error;
use crate::expand;
use crate::parser;
use crate::redirect::{self, StdioSnapshot};
use crate::search;
use crate::session::Session;

/// Evaluate one command line: blank lines are skipped outright, a line
/// containing a pipe goes to the pipeline executor, anything else runs as a
/// single stage.
pub fn eval_line(session: &mut Session, raw: &str) -> i32 {
    let line = parser::strip_newline(raw);
    if line.trim().is_empty() {
        return 0;
    }
    match parser::split_pipeline(line) {
        Some((left, right)) => eval_pipeline(session, left, right),
        None => eval_stage(session, line),
    }
}

/// Run one stage: tokenize, expand wildcards, snapshot the standard
/// descriptors, resolve redirection, then dispatch a built-in or supervise
/// an external command. The snapshot guard restores descriptors on every
/// exit path, early returns included.
fn eval_stage(session: &mut Session, line: &str) -> i32 {
    let args = parser::tokenize(line);
    if args.is_empty() {
        return 0;
    }
    let mut args = expand::expand_wildcards(args);

    let _stdio = match StdioSnapshot::capture() {
        Ok(snapshot) => snapshot,
        Err(e) => fatal(&e),
    };
    let spec = match redirect::extract_redirections(&mut args) {
        Ok(spec) => spec,
        Err(e) => {
            // A malformed operator aborts the stage, not the interpreter.
            eprintln!("msh: {e}");
            return 2;
        }
    };
    if let Err(e) = redirect::apply_redirections(&spec) {
        fatal(&e);
    }
    if args.is_empty() {
        return 0;
    }

    if let Some(cmd) = builtin::match_builtin(&args[0]) {
        debug!(name = %args[0], "dispatching built-in");
        return cmd(session, &args);
    }
    run_external(&args)
}

/// Two forked stages joined by one pipe, each re-entering the single-stage
/// executor. The parent waits left-then-right and reports only the right
/// stage's status.
fn eval_pipeline(session: &mut Session, left: &str, right: &str) -> i32 {
    // The exit built-in keeps its documented quirk of ending the whole
    // interpreter even as a pipeline stage, so it must run before any fork.
    for side in [left, right] {
        let tokens = parser::tokenize(side);
        if tokens.first().map(String::as_str) == Some("exit") {
            return builtin::builtin_exit(session, &tokens);
        }
    }

    let (read_end, write_end) = match unistd::pipe() {
        Ok(ends) => ends,
        Err(e) => fatal(&Error::PipeCreation(e)),
    };
    debug!(%left, %right, "starting pipeline");

    let left_pid = match unsafe { unistd::fork() } {
        Err(e) => fatal(&Error::ForkFailure(e)),
        Ok(ForkResult::Child) => {
            drop(read_end);
            if unistd::dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO).is_err() {
                unsafe { libc::_exit(1) }
            }
            drop(write_end);
            exit_stage(eval_stage(session, left));
        }
        Ok(ForkResult::Parent { child }) => child,
    };
    let right_pid = match unsafe { unistd::fork() } {
        Err(e) => fatal(&Error::ForkFailure(e)),
        Ok(ForkResult::Child) => {
            drop(write_end);
            if unistd::dup2(read_end.as_raw_fd(), libc::STDIN_FILENO).is_err() {
                unsafe { libc::_exit(1) }
            }
            drop(read_end);
            exit_stage(eval_stage(session, right));
        }
        Ok(ForkResult::Parent { child }) => child,
    };

    // Both parent ends must close here, or the right stage never sees EOF.
    drop(read_end);
    drop(write_end);

    let _ = waitpid(left_pid, None);
    match waitpid(right_pid, None) {
        Ok(status) => report_status(status),
        Err(e) => {
            eprintln!("msh: waitpid: {e}");
            1
        }
    }
}

/// Fork, exec and wait for a non-built-in command.
fn run_external(args: &[String]) -> i32 {
    debug!(name = %args[0], "spawning external command");
    match unsafe { unistd::fork() } {
        Err(e) => fatal(&Error::ForkFailure(e)),
        Ok(ForkResult::Child) => exec_child(args),
        Ok(ForkResult::Parent { child }) => wait_and_report(child),
    }
}

fn wait_and_report(child: Pid) -> i32 {
    match waitpid(child, None) {
        Ok(status) => {
            debug!(?status, "child finished");
            report_status(status)
        }
        Err(e) => {
            eprintln!("msh: waitpid: {e}");
            1
        }
    }
}

/// Child side of an external launch. The error stream stays open so exec
/// diagnostics remain visible to the user.
fn exec_child(args: &[String]) -> ! {
    let Some(path) = search::resolve(&args[0]) else {
        eprintln!("msh: command not found: {}", args[0]);
        unsafe { libc::_exit(127) }
    };
    debug!(path = %path.display(), "resolved executable");

    let argv: Vec<CString> = match args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<CString>, _>>()
    {
        Ok(argv) => argv,
        Err(_) => {
            eprintln!("msh: {}: argument contains a nul byte", args[0]);
            unsafe { libc::_exit(126) }
        }
    };
    let path_c = match CString::new(path.into_os_string().into_vec()) {
        Ok(path_c) => path_c,
        Err(_) => {
            eprintln!("msh: {}: path contains a nul byte", args[0]);
            unsafe { libc::_exit(126) }
        }
    };

    let errno = unistd::execv(&path_c, &argv).unwrap_err();
    eprintln!("msh: {}: {}", args[0], errno);
    unsafe { libc::_exit(126) }
}

/// Translate a wait status into a report; silent only on a clean zero exit.
fn report_status(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, 0) => 0,
        WaitStatus::Exited(_, code) => {
            println!("Command exited with status {code}");
            code
        }
        WaitStatus::Signaled(_, signal, _) => {
            println!(
                "Command terminated by signal {} ({})",
                signal as i32,
                signal.as_str()
            );
            128 + signal as i32
        }
        WaitStatus::Stopped(_, signal) => {
            println!(
                "Command stopped by signal {} ({})",
                signal as i32,
                signal.as_str()
            );
            128 + signal as i32
        }
        _ => 0,
    }
}

/// Leave a forked stage without running destructors or atexit handlers.
fn exit_stage(status: i32) -> ! {
    let _ = io::stdout().flush();
    unsafe { libc::_exit(status as libc::c_int) }
}

/// Fatal-process errors: descriptor, pipe and fork failures leave the
/// process (interpreter or pipeline child) in a state not worth recovering.
fn fatal(err: &Error) -> ! {
    eprintln!("msh: {err}");
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn clean_exit_reports_nothing_and_returns_zero() {
        let status = WaitStatus::Exited(Pid::from_raw(100), 0);
        assert_eq!(report_status(status), 0);
    }

    #[test]
    fn nonzero_exit_code_is_passed_through() {
        let status = WaitStatus::Exited(Pid::from_raw(100), 42);
        assert_eq!(report_status(status), 42);
    }

    #[test]
    fn signal_termination_maps_past_128() {
        let status = WaitStatus::Signaled(Pid::from_raw(100), Signal::SIGKILL, false);
        assert_eq!(report_status(status), 128 + Signal::SIGKILL as i32);
    }

    #[test]
    fn blank_lines_never_dispatch() {
        let mut session = Session::new();
        assert_eq!(eval_line(&mut session, "\n"), 0);
        assert_eq!(eval_line(&mut session, "     \n"), 0);
        assert_eq!(eval_line(&mut session, ""), 0);
    }
}
