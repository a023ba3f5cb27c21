use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::Result;

#[derive(Debug, Clone)]
pub struct Mail {
    pub to :      String,
    pub subject : String,
    pub body :    String,
}

impl Mail {
    /// RFC 5322-ish text, enough for a local mail pickup directory.
    pub fn to_message(&self, from : &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            from,
            self.to,
            self.subject,
            self.body.replace('\n', "\r\n"),
        )
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail : &Mail) -> Result<()>;
}

/// Writes outgoing mail to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail : &Mail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "mail\n{}", mail.body);
        Ok(())
    }
}

/// Drops one `.eml` file per message into a directory for an MTA to pick
/// up.
pub struct SpoolMailer {
    pub dir :  PathBuf,
    pub from : String,
}

impl Mailer for SpoolMailer {
    fn send(&self, mail : &Mail) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let name = format!(
            "{}-{}.eml",
            time::OffsetDateTime::now_utc().unix_timestamp_nanos(),
            crate::crypto::random_code(8),
        );
        let path = self.dir.join(name);

        fs::write(&path, mail.to_message(&self.from))?;
        info!(to = %mail.to, path = %path.display(), "spooled mail");

        Ok(())
    }
}
