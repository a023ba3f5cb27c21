use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time(time::OffsetDateTime);

/// The text form of SQLite's `CURRENT_TIMESTAMP`.
pub(crate) const TIME_FORMAT : &[time::format_description::FormatItem<
    'static,
>] = time::macros::format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second]"
);

/// RFC 822 dates as RSS wants them, always in UTC.
pub(crate) const RSS_FORMAT : &[time::format_description::FormatItem<
    'static,
>] = time::macros::format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] +0000"
);

impl Time {
    pub fn now() -> Self {
        Time(time::OffsetDateTime::now_utc())
    }

    pub fn rss(&self) -> String {
        self.format(&RSS_FORMAT).unwrap_or_default()
    }
}

impl Serialize for Time {
    fn serialize<S>(
        &self,
        serializer : S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S : Serializer,
    {
        self.format(&TIME_FORMAT)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl From<time::OffsetDateTime> for Time {
    fn from(t : time::OffsetDateTime) -> Self {
        Time(t)
    }
}

impl std::ops::Deref for Time {
    type Target = time::OffsetDateTime;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
