//! Run loop shared by every subprocess-backed hook.

use std::{
    io::{BufRead, BufReader},
    process::{ChildStdout, Command, Stdio},
};

use super::{bspwm, CommandConfig, HookConfig, HookEvent, Notification, Runner};
use crate::tools::split_sleep;

fn parse(config: &HookConfig, line: &str) -> HookEvent {
    match config {
        HookConfig::Bspwm(_) => HookEvent::Bspwm(bspwm::parse_status(line)),
        _ => HookEvent::Raw(line.to_string()),
    }
}

fn empty_event(config: &HookConfig) -> HookEvent {
    match config {
        HookConfig::Bspwm(_) => HookEvent::Bspwm(Vec::new()),
        _ => HookEvent::Raw(String::new()),
    }
}

fn spawn(runner: &Runner, config: &CommandConfig) -> std::io::Result<BufReader<ChildStdout>> {
    let Some((program, args)) = config.cmd.split_first() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty command",
        ));
    };

    tracing::debug!("launching {:?}", config.cmd);
    let mut child = Command::new(program)
        .args(args)
        // pin the locale so parsed output looks the same everywhere
        .env("LANG", "en_US")
        .stdout(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "child has no stdout")
    })?;

    // The hook keeps the handle so stop() can kill the process and
    // interrupt our blocking read.
    *super::lock_ignore_poison(&runner.child) = Some(child);
    Ok(BufReader::new(stdout))
}

fn exit_code(runner: &Runner) -> Option<i32> {
    let child = super::lock_ignore_poison(&runner.child).take();
    child.and_then(|mut child| child.wait().ok()).and_then(|status| status.code())
}

/// Blocking loop: spawn the command, deliver each stdout line to the
/// subscribers, respawn on exit. An exit code outside the allow-list (or a
/// spawn failure) is surfaced as a `running=false` notification followed by
/// the failure backoff.
pub(crate) fn run(runner: &Runner) {
    let Some(config) = runner.config.command_config() else {
        return;
    };

    let mut reader = None;
    while !runner.stop.is_set() {
        if reader.is_none() {
            match spawn(runner, config) {
                Ok(r) => reader = Some(r),
                Err(e) => {
                    tracing::error!("could not launch {:?}: {e}", config.cmd);
                    runner.notify(&Notification {
                        running: false,
                        event: empty_event(&runner.config),
                    });
                    split_sleep(runner.failure_refresh, &runner.stop);
                    continue;
                }
            }
        }

        let mut line = String::new();
        match reader.as_mut().map(|r| r.read_line(&mut line)) {
            Some(Ok(0)) => {
                // EOF: the process exited; decide from its code whether
                // this is a clean cycle or a failure.
                reader = None;
                if runner.stop.is_set() {
                    break;
                }
                let code = exit_code(runner);
                if code.is_some_and(|c| config.return_codes.contains(&c)) {
                    continue;
                }
                tracing::error!("{:?} failed with return code {:?}", config.cmd, code);
                runner.notify(&Notification {
                    running: false,
                    event: empty_event(&runner.config),
                });
                split_sleep(runner.failure_refresh, &runner.stop);
            }
            Some(Ok(_)) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                runner.notify(&Notification {
                    running: true,
                    event: parse(&runner.config, trimmed),
                });
            }
            Some(Err(e)) => {
                if runner.stop.is_set() {
                    break;
                }
                tracing::error!("error when reading line: {e}");
                reader = None;
                if let Some(child) = super::lock_ignore_poison(&runner.child).take().as_mut() {
                    let _ = child.kill();
                }
                runner.notify(&Notification {
                    running: false,
                    event: empty_event(&runner.config),
                });
                split_sleep(runner.failure_refresh, &runner.stop);
            }
            None => unreachable!("reader was just spawned"),
        }
    }

    if let Some(child) = super::lock_ignore_poison(&runner.child).take().as_mut() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Callback, Hook, HookConfig};
    use super::*;
    use std::{
        sync::{mpsc, Mutex},
        time::Duration,
    };

    fn sh(script: &str) -> HookConfig {
        HookConfig::Command(CommandConfig::new(["sh", "-c", script]))
    }

    fn collector() -> (Callback, mpsc::Receiver<(bool, HookEvent)>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback = Callback::new(move |n| {
            let _ = tx.lock().unwrap().send((n.running, n.event.clone()));
        });
        (callback, rx)
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn lines_are_delivered_in_order() {
        let hook = Hook::new(
            sh("printf 'one\\ntwo\\n'; sleep 30"),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        let (callback, rx) = collector();
        hook.add_callback(callback);
        hook.start();

        let first = rx.recv_timeout(TIMEOUT).unwrap();
        let second = rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(first, (true, HookEvent::Raw("one".to_string())));
        assert_eq!(second, (true, HookEvent::Raw("two".to_string())));

        hook.stop();
        assert!(!hook.is_started());
    }

    #[test]
    fn disallowed_exit_code_notifies_not_running_then_retries() {
        let hook = Hook::new(
            sh("echo hi; exit 3"),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        let (callback, rx) = collector();
        hook.add_callback(callback);
        hook.start();

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            (true, HookEvent::Raw("hi".to_string()))
        );
        // The failed cycle surfaces as a degraded notification, then the
        // command is retried after the backoff.
        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            (false, HookEvent::Raw(String::new()))
        );
        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            (true, HookEvent::Raw("hi".to_string()))
        );

        hook.stop();
    }

    #[test]
    fn missing_command_backs_off_with_degraded_notifications() {
        let hook = Hook::new(
            HookConfig::Command(CommandConfig::new(["barwire-does-not-exist"])),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        let (callback, rx) = collector();
        hook.add_callback(callback);
        hook.start();

        let (running, _) = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(!running);
        let (running, _) = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(!running);

        hook.stop();
    }

    #[test]
    fn empty_command_degrades_instead_of_panicking() {
        let hook = Hook::new(
            HookConfig::Command(CommandConfig::new(Vec::<String>::new())),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        let (callback, rx) = collector();
        hook.add_callback(callback);
        hook.start();

        let (running, _) = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(!running);

        hook.stop();
    }

    #[test]
    fn panicking_callback_does_not_starve_others() {
        let hook = Hook::new(
            sh("echo hi; sleep 30"),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        hook.add_callback(Callback::new(|_| panic!("boom")));
        let (callback, rx) = collector();
        hook.add_callback(callback);
        hook.start();

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            (true, HookEvent::Raw("hi".to_string()))
        );

        hook.stop();
    }
}
