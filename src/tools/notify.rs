//! Email-style notifications.
//!
//! Notifications are fire-and-forget: callers log a failed send and carry on.

use std::io;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use tracing::debug;

use crate::config::NotifyConfig;

/// The placeholder replaced by the subject within notification arguments.
const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// A notification.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Notification {
    /// The subject line.
    pub subject: String,
    /// The body.
    pub body: String,
    /// Files attached to the notification.
    pub attachments: Vec<PathBuf>,
}

/// A notification channel.
pub trait Notifier {
    /// Sends a notification.
    fn notify(&self, notification: &Notification) -> io::Result<()>;
}

/// A notifier that pipes the body into a mail program.
#[derive(Clone, Debug)]
pub struct CommandNotifier {
    /// The configuration.
    config: NotifyConfig,
}

impl CommandNotifier {
    /// Creates a notifier.
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    /// Builds the command for a notification.
    fn command(&self, notification: &Notification) -> Command {
        let mut command = Command::new(&self.config.program);

        for arg in &self.config.args {
            command.arg(arg.replace(SUBJECT_PLACEHOLDER, &notification.subject));
        }

        for attachment in notification.attachments.iter().filter(|path| path.exists()) {
            command.arg(&self.config.attachment_flag).arg(attachment);
        }

        command.args(&self.config.recipients);
        command
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) -> io::Result<()> {
        if self.config.recipients.is_empty() {
            debug!(
                "no notification recipients configured: dropping `{}`",
                notification.subject
            );
            return Ok(());
        }

        let mut child = self
            .command(notification)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;

        // The child is reaped before a failed write is reported.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(notification.body.as_bytes()),
            None => Ok(()),
        };

        let status = child.wait()?;
        written?;

        if !status.success() {
            return Err(io::Error::other(format!(
                "`{}` exited with {status}",
                self.config.program
            )));
        }

        Ok(())
    }
}
