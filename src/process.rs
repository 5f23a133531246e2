//! External process helpers.
//!
//! Every shell-out in metarepo (git, rsync, the platform serial-number tools,
//! language toolchains) goes through these two functions so that failures are
//! classified the same way everywhere:
//!
//! - the program cannot be started → [`Error::ExternalToolMissing`]
//! - it exits non-zero → [`Error::ExternalTool`] (stderr is not parsed)
//! - it outlives the optional timeout → killed, [`Error::ExternalToolTimeout`]
//!
//! On Unix a captured command with a timeout runs in its own process group,
//! and the whole group is killed when the limit is hit. Interactive commands
//! stay in the terminal's group so credential prompts keep working; only the
//! direct child is killed for them.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use log::debug;
use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Run `program` with `args` and return its standard output.
///
/// Standard input is closed and standard error is discarded.
pub fn capture<I, S>(
    program: &str,
    args: I,
    dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args = collect_args(args);
    let mut command = build(program, &args, dir);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    let isolated = timeout.is_some();
    if isolated {
        isolate(&mut command);
    }

    let mut child = command.spawn().map_err(|e| missing(program, e))?;

    // Drain stdout on a separate thread so a chatty child cannot block on a
    // full pipe while we wait for it.
    let mut stdout = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_end(&mut buffer);
        }
        buffer
    });

    let status = wait(&mut child, program, &args, timeout, isolated)?;
    let buffer = reader.join().unwrap_or_default();
    check(program, &args, status)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Run `program` with the terminal's standard streams attached.
///
/// Used for operations whose progress output and credential prompts should
/// reach the user directly, such as `git clone`.
pub fn interactive<I, S>(
    program: &str,
    args: I,
    dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args = collect_args(args);
    let mut child = build(program, &args, dir)
        .spawn()
        .map_err(|e| missing(program, e))?;
    let status = wait(&mut child, program, &args, timeout, false)?;
    check(program, &args, status)
}

fn collect_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect()
}

fn build(program: &str, args: &[OsString], dir: Option<&Path>) -> Command {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    debug!(
        "running `{} {}`{}",
        program,
        display_args(args),
        dir.map(|d| format!(" in {}", d.display()))
            .unwrap_or_default()
    );
    command
}

/// Start the child as the leader of a new process group.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// Signal every process in the group led by `child`.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        debug!("killpg {} failed: {}", child.id(), e);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn wait(
    child: &mut Child,
    program: &str,
    args: &[OsString],
    timeout: Option<Duration>,
    isolated: bool,
) -> Result<ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    match child.wait_timeout(limit)? {
        Some(status) => Ok(status),
        None => {
            debug!(
                "`{} {}` exceeded {:?}, killing",
                program, display_args(args), limit
            );
            if isolated {
                kill_group(child);
            }
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::ExternalToolTimeout {
                program: program.to_string(),
                args: display_args(args),
                timeout: limit,
            })
        }
    }
}

fn check(program: &str, args: &[OsString], status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::ExternalTool {
            program: program.to_string(),
            args: display_args(args),
            status,
        })
    }
}

fn missing(program: &str, error: std::io::Error) -> Error {
    Error::ExternalToolMissing {
        program: program.to_string(),
        message: error.to_string(),
    }
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
