use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "bookmarks", about = "Social bookmarking server")]
pub struct Config {
    /// SQLite database file, created if missing
    #[arg(long, env = "BOOKMARKS_DB", default_value = "bookmarks.sqlite3")]
    pub db : PathBuf,

    #[arg(long, env = "BOOKMARKS_ADDR", default_value = "127.0.0.1:3000")]
    pub addr : SocketAddr,

    /// Public base URL, used in feeds and invitation links
    #[arg(long, env = "BOOKMARKS_SITE_URL", default_value = "http://localhost:3000")]
    pub site_url : String,

    /// Issuer and audience of session tokens
    #[arg(long, env = "BOOKMARKS_SERVER_NAME", default_value = "localhost")]
    pub server_name : String,

    #[arg(long, env = "BOOKMARKS_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret : String,

    /// Write outgoing mail here instead of logging it
    #[arg(long, env = "BOOKMARKS_MAIL_SPOOL")]
    pub mail_spool : Option<PathBuf>,

    #[arg(long, env = "BOOKMARKS_MAIL_FROM", default_value = "noreply@localhost")]
    pub mail_from : String,

    #[arg(short, long)]
    pub verbose : bool,
}

impl Config {
    pub fn site_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}
