//! Operator pacing between loop iterations.
//!
//! Operator input arrives as text lines on a channel, usually fed by
//! [`spawn_stdin_listener`]. A line reading `q` requests quit.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// What the loop should do after pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    Continue,
    Quit,
}

/// Per-iteration interaction policy injected into the session loops.
#[derive(Debug)]
pub enum PacingPolicy {
    /// Wait for an operator line after each step. A closed channel continues.
    BlockingConfirm(Receiver<String>),
    /// Poll for a quit line, waiting at most `timeout`.
    NonBlockingPoll {
        input: Receiver<String>,
        timeout: Duration,
    },
    /// Never wait, never quit.
    AutoContinue,
}

impl PacingPolicy {
    pub fn blocking(input: Receiver<String>) -> Self {
        Self::BlockingConfirm(input)
    }

    pub fn polling(input: Receiver<String>, timeout: Duration) -> Self {
        Self::NonBlockingPoll { input, timeout }
    }

    pub fn pace(&mut self) -> Pace {
        match self {
            PacingPolicy::BlockingConfirm(input) => match input.recv() {
                Ok(line) => command(&line),
                Err(_) => Pace::Continue,
            },
            PacingPolicy::NonBlockingPoll { input, timeout } => {
                match input.recv_timeout(*timeout) {
                    Ok(line) => command(&line),
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                        Pace::Continue
                    }
                }
            }
            PacingPolicy::AutoContinue => Pace::Continue,
        }
    }
}

fn command(line: &str) -> Pace {
    if line.trim().eq_ignore_ascii_case("q") {
        Pace::Quit
    } else {
        Pace::Continue
    }
}

/// Forward stdin lines to a channel from a detached thread.
///
/// The thread ends on EOF, on a read error or once the receiver is dropped.
pub fn spawn_stdin_listener() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("operator-input".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        log::warn!("operator input unavailable: {err}");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_confirm_quits_on_q_only() {
        let (tx, rx) = mpsc::channel();
        let mut pacing = PacingPolicy::blocking(rx);
        tx.send(String::new()).expect("send");
        tx.send(" Q \n".into()).expect("send");
        assert_eq!(pacing.pace(), Pace::Continue);
        assert_eq!(pacing.pace(), Pace::Quit);
        drop(tx);
        assert_eq!(pacing.pace(), Pace::Continue);
    }

    #[test]
    fn polling_times_out_and_continues() {
        let (tx, rx) = mpsc::channel::<String>();
        let mut pacing = PacingPolicy::polling(rx, Duration::from_millis(1));
        assert_eq!(pacing.pace(), Pace::Continue);
        tx.send("q".into()).expect("send");
        assert_eq!(pacing.pace(), Pace::Quit);
    }

    #[test]
    fn auto_continue_never_quits() {
        let mut pacing = PacingPolicy::AutoContinue;
        assert!((0..10).all(|_| pacing.pace() == Pace::Continue));
    }
}
