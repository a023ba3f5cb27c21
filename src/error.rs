use std::sync::Mutex;

use quick_from::QuickFrom;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(QuickFrom, Debug)]
pub enum Error {
    DuplicateName(String),
    DuplicateFriend(String),
    TokenDurationTooBig,
    UserNameNotFound(String),
    UserIdNotFound(u32),
    TagNotFound(String),
    SharedNotFound(u32),
    InvitationNotFound(String),
    /// Carries the path the visitor asked for, so login can send them back.
    LoginRequired(String),
    FailedLogin,
    Unauthorized,
    BadRequest,
    RouteNotFound,
    Mail(String),
    Internal,

    #[quick_from]
    Sqlite(rusqlite::Error),

    #[quick_from]
    Time(std::time::SystemTimeError),

    #[quick_from]
    Io(std::io::Error),

    #[quick_from]
    Argon2(argon2::Error),

    #[quick_from]
    Jwt(jsonwebtoken::errors::ErrorKind),

    #[quick_from]
    Warp(warp::Error),

    #[quick_from]
    Template(handlebars::TemplateError),

    #[quick_from]
    Render(handlebars::RenderError),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        use Error::*;
        matches!(
            self,
            UserNameNotFound(_)
                | UserIdNotFound(_)
                | TagNotFound(_)
                | SharedNotFound(_)
                | InvitationNotFound(_)
                | RouteNotFound
        )
    }
}

/// Lets an `Error` ride through warp's rejection machinery, which needs
/// `Sync` and hands out shared references.
#[derive(Debug)]
pub struct ErrorCell(Mutex<Option<Error>>);

impl ErrorCell {
    pub fn new(err : Error) -> Self {
        ErrorCell(Mutex::new(Some(err)))
    }

    pub fn take(&self) -> Option<Error> {
        self.0.lock().ok().and_then(|mut err| err.take())
    }
}
