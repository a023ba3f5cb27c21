use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;

use crate::paginate::{Page, Paginator, ITEMS_PER_PAGE};
use crate::time_utils::TIME_FORMAT;
use crate::{models, Error, Result};

/// How many rows the front page, popular page, feeds and searches show.
pub const LISTING_LIMIT : u32 = 10;

const SCHEMA : &str = include_str!("../sql/schema.sql");

const SQLITE_CONSTRAINT_UNIQUE : i64 = 2067;

macro_rules! entry_select {
    () => {
        "SELECT b.id AS id, b.title AS title, l.url AS url, u.name AS username
         FROM bookmarks b
         JOIN links l ON l.id = b.link_id
         JOIN users u ON u.id = b.user_id"
    };
}

macro_rules! shared_select {
    () => {
        "SELECT s.id AS id, s.date AS date, s.votes AS votes,
                b.id AS id, b.title AS title, l.url AS url, u.name AS username
         FROM shared_bookmarks s
         JOIN bookmarks b ON b.id = s.bookmark_id
         JOIN links l ON l.id = b.link_id
         JOIN users u ON u.id = b.user_id"
    };
}

macro_rules! comment_select {
    () => {
        "SELECT c.id AS id, u.name AS username, c.text AS text, c.created AS created
         FROM comments c
         JOIN users u ON u.id = c.user_id"
    };
}

fn error_code_match(
    err : &rusqlite::Error,
    code : ffi::ErrorCode,
    ext : i64,
) -> bool {
    matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == code
                && i64::from(e.extended_code) == ext)
}

/// `%` and `_` in user input match themselves.
fn escape_like(s : &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

macro_rules! db_method {
        ($(#[$meta:meta])* $name:ident (
            &$self:ident,
            $conn:ident
            $(, $pname:ident : $ptype:ty)*
        ) -> $ret:ty $body:block ) => {
            $(#[$meta])*
            pub async fn $name (&$self, $( $pname : $ptype, )* ) -> $ret {
                let $conn = $self.conn.lock().await;
                tokio::task::block_in_place(|| $body)
            }
        }
    }

pub struct Db {
    conn : Mutex<Connection>,
}

impl Db {
    pub fn new<P : AsRef<std::path::Path>>(p : P) -> Result<Self> {
        Self::init(Connection::open(p)?)
    }

    pub fn memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn : Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn : Mutex::new(conn),
        })
    }

    db_method! {insert_user(
        &self,
        conn,
        name : &str,
        email : &str,
        password : &str
    ) -> Result<models::User> {
        create_user(&conn, name, email, password)
    }}

    db_method! {
        /// Creates the account and, when `invitation` names a pending
        /// invitation, befriends the sender both ways and consumes it.
        register_user(
        &self,
        conn,
        name : &str,
        email : &str,
        password : &str,
        invitation : Option<&str>
    ) -> Result<models::User> {
        let tx = conn.unchecked_transaction()?;

        let user = create_user(&tx, name, email, password)?;

        if let Some(inv) = invitation.map(|code| find_invitation(&tx, code)) {
            if let Some(inv) = inv? {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR IGNORE INTO friendships (from_friend, to_friend)
                     VALUES (?, ?)",
                )?;
                stmt.execute(params![user.id, inv.sender_id])?;
                stmt.execute(params![inv.sender_id, user.id])?;

                tx.prepare_cached("DELETE FROM invitations WHERE id = ?")?
                    .execute(params![inv.id])?;

                debug!(user = %user.name, sender = inv.sender_id, "invitation accepted");
            }
        }

        tx.commit()?;
        Ok(user)
    }}

    db_method! {get_user(&self, conn, user_id : u32) -> Result<models::User> {
        user_by_id(&conn, user_id)
    }}

    db_method! {get_user_by_name(
        &self,
        conn,
        username : &str
    ) -> Result<models::User> {
        let mut stmt = conn
            .prepare_cached("SELECT * FROM users WHERE users.name = ?")?;

        let mut rows = stmt.query(params![username])?;

        let row = rows.next()?
            .ok_or_else(|| Error::UserNameNotFound(username.to_string()))?;

        row_parse(row)
    }}

    db_method! {
        /// Saves a bookmark for the user, or updates the one they already have
        /// for the same URL: the title is overwritten and the tag set replaced.
        save_bookmark(
        &self,
        conn,
        user_id : u32,
        save : &models::SaveBookmark
    ) -> Result<models::Entry> {
        let tx = conn.unchecked_transaction()?;

        let link = get_or_create_link(&tx, &save.url)?;

        let existing : Option<u32> = tx
            .prepare_cached(
                "SELECT id FROM bookmarks WHERE user_id = ? AND link_id = ?",
            )?
            .query_row(params![user_id, link.id], |r| r.get(0))
            .optional()?;

        let bookmark_id = match existing {
            Some(id) => {
                tx.prepare_cached("UPDATE bookmarks SET title = ? WHERE id = ?")?
                    .execute(params![save.title, id])?;
                tx.prepare_cached("DELETE FROM bookmark_tags WHERE bookmark_id = ?")?
                    .execute(params![id])?;
                id
            },
            None => {
                tx.prepare_cached(
                    "INSERT INTO bookmarks (title, user_id, link_id) VALUES (?, ?, ?)",
                )?
                .execute(params![save.title, user_id, link.id])?;
                tx.last_insert_rowid() as u32
            },
        };

        for name in &save.tags {
            let tag = get_or_create_tag(&tx, name)?;
            tx.prepare_cached(
                "INSERT OR IGNORE INTO bookmark_tags (bookmark_id, tag_id) VALUES (?, ?)",
            )?
            .execute(params![bookmark_id, tag.id])?;
        }

        if save.share {
            let shared : Option<u32> = tx
                .prepare_cached("SELECT id FROM shared_bookmarks WHERE bookmark_id = ?")?
                .query_row(params![bookmark_id], |r| r.get(0))
                .optional()?;

            // sharing counts as the owner's vote
            if shared.is_none() {
                tx.prepare_cached("INSERT INTO shared_bookmarks (bookmark_id) VALUES (?)")?
                    .execute(params![bookmark_id])?;
                let shared_id = tx.last_insert_rowid() as u32;
                tx.prepare_cached(
                    "INSERT INTO shared_bookmark_votes (shared_id, user_id) VALUES (?, ?)",
                )?
                .execute(params![shared_id, user_id])?;
            }
        }

        let entry = entry_by_id(&tx, bookmark_id)?;
        tx.commit()?;

        debug!(
            user_id,
            bookmark = bookmark_id,
            updated = existing.is_some(),
            "saved bookmark"
        );

        Ok(entry)
    }}

    db_method! {get_bookmark_by_url(
        &self,
        conn,
        user_id : u32,
        url : &str
    ) -> Result<Option<models::Entry>> {
        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(entry_select!(), " WHERE b.user_id = ? AND l.url = ?"),
            params![user_id, url],
        )?;

        Ok(attach_tags(&conn, rows)?.pop())
    }}

    db_method! {user_bookmarks(
        &self,
        conn,
        user_id : u32,
        page : Option<&str>
    ) -> Result<Page<models::Entry>> {
        let count : u32 = conn
            .prepare_cached("SELECT COUNT(*) FROM bookmarks WHERE user_id = ?")?
            .query_row(params![user_id], |r| r.get(0))?;

        let paginator = Paginator::new(count, ITEMS_PER_PAGE);
        let number = paginator.resolve(page);

        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(
                entry_select!(),
                " WHERE b.user_id = ? ORDER BY b.id DESC LIMIT ? OFFSET ?"
            ),
            params![user_id, paginator.per_page(), paginator.offset(number)],
        )?;

        Ok(paginator.page(number, attach_tags(&conn, rows)?))
    }}

    db_method! {tag_bookmarks(
        &self,
        conn,
        tag_name : &str
    ) -> Result<Vec<models::Entry>> {
        let tag_id : u32 = conn
            .prepare_cached("SELECT id FROM tags WHERE name = ?")?
            .query_row(params![tag_name], |r| r.get(0))
            .optional()?
            .ok_or_else(|| Error::TagNotFound(tag_name.to_string()))?;

        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(
                entry_select!(),
                " JOIN bookmark_tags bt ON bt.bookmark_id = b.id
                  WHERE bt.tag_id = ? ORDER BY b.id DESC"
            ),
            params![tag_id],
        )?;

        attach_tags(&conn, rows)
    }}

    db_method! {tag_counts(&self, conn) -> Result<Vec<models::TagCount>> {
        query_rows(
            &conn,
            "SELECT t.name AS name, COUNT(bt.bookmark_id) AS count
             FROM tags t
             LEFT JOIN bookmark_tags bt ON bt.tag_id = t.id
             GROUP BY t.id
             ORDER BY t.name",
            [],
        )
    }}

    db_method! {
        /// Bookmarks whose title contains every keyword, ignoring ASCII case.
        search(
        &self,
        conn,
        keywords : &[String]
    ) -> Result<Vec<models::Entry>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(concat!(entry_select!(), " WHERE 1 = 1"));
        for _ in keywords {
            sql.push_str(" AND b.title LIKE ? ESCAPE '\\'");
        }
        sql.push_str(" ORDER BY b.id DESC LIMIT ?");

        let mut args : Vec<rusqlite::types::Value> = keywords
            .iter()
            .map(|k| format!("%{}%", escape_like(k)).into())
            .collect();
        args.push(i64::from(LISTING_LIMIT).into());

        let rows : Vec<EntryRow> =
            query_rows(&conn, &sql, rusqlite::params_from_iter(args))?;

        attach_tags(&conn, rows)
    }}

    db_method! {autocomplete_tags(
        &self,
        conn,
        prefix : &str
    ) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT name FROM tags WHERE name LIKE ? ESCAPE '\\' ORDER BY name LIMIT ?",
        )?;

        let names = stmt
            .query_map(
                params![format!("{}%", escape_like(prefix)), LISTING_LIMIT],
                |r| r.get(0),
            )?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }}

    db_method! {recent_shared(&self, conn) -> Result<Vec<models::SharedEntry>> {
        let rows = query_rows(
            &conn,
            concat!(shared_select!(), " ORDER BY s.date DESC, s.id DESC LIMIT ?"),
            params![LISTING_LIMIT],
        )?;

        attach_shared(&conn, rows)
    }}

    db_method! {
        /// The most voted bookmarks among those shared during the last day.
        popular_shared(&self, conn) -> Result<Vec<models::SharedEntry>> {
        let rows = query_rows(
            &conn,
            concat!(
                shared_select!(),
                " WHERE s.date > datetime('now', '-1 day')
                  ORDER BY s.votes DESC, s.date DESC, s.id DESC LIMIT ?"
            ),
            params![LISTING_LIMIT],
        )?;

        attach_shared(&conn, rows)
    }}

    db_method! {get_shared(
        &self,
        conn,
        shared_id : u32
    ) -> Result<models::SharedEntry> {
        let rows = query_rows(
            &conn,
            concat!(shared_select!(), " WHERE s.id = ?"),
            params![shared_id],
        )?;

        attach_shared(&conn, rows)?
            .pop()
            .ok_or(Error::SharedNotFound(shared_id))
    }}

    db_method! {
        /// Returns whether the vote counted. The connection lock is held from
        /// the check to the write, so a user's second vote is always ignored.
        vote(
        &self,
        conn,
        shared_id : u32,
        user_id : u32
    ) -> Result<bool> {
        let found : Option<u32> = conn
            .prepare_cached("SELECT id FROM shared_bookmarks WHERE id = ?")?
            .query_row(params![shared_id], |r| r.get(0))
            .optional()?;

        if found.is_none() {
            return Err(Error::SharedNotFound(shared_id));
        }

        let voted = conn
            .prepare_cached(
                "SELECT 1 FROM shared_bookmark_votes WHERE shared_id = ? AND user_id = ?",
            )?
            .exists(params![shared_id, user_id])?;

        if voted {
            return Ok(false);
        }

        let tx = conn.unchecked_transaction()?;
        tx.prepare_cached("UPDATE shared_bookmarks SET votes = votes + 1 WHERE id = ?")?
            .execute(params![shared_id])?;
        tx.prepare_cached(
            "INSERT INTO shared_bookmark_votes (shared_id, user_id) VALUES (?, ?)",
        )?
        .execute(params![shared_id, user_id])?;
        tx.commit()?;

        Ok(true)
    }}

    db_method! {
        /// Comments on a shared bookmark, oldest first.
        comments_for(
        &self,
        conn,
        shared_id : u32
    ) -> Result<Vec<models::Comment>> {
        query_rows(
            &conn,
            concat!(comment_select!(), " WHERE c.shared_id = ? ORDER BY c.id"),
            params![shared_id],
        )
    }}

    db_method! {add_comment(
        &self,
        conn,
        shared_id : u32,
        user_id : u32,
        text : &str
    ) -> Result<models::Comment> {
        let found = conn
            .prepare_cached("SELECT 1 FROM shared_bookmarks WHERE id = ?")?
            .exists(params![shared_id])?;

        if !found {
            return Err(Error::SharedNotFound(shared_id));
        }

        conn.prepare_cached(
            "INSERT INTO comments (shared_id, user_id, text) VALUES (?, ?, ?)",
        )?
        .execute(params![shared_id, user_id, text])?;

        let mut comments : Vec<models::Comment> = query_rows(
            &conn,
            concat!(comment_select!(), " WHERE c.id = ?"),
            params![conn.last_insert_rowid()],
        )?;

        comments.pop().ok_or(Error::Internal)
    }}

    db_method! {friends_of(&self, conn, user_id : u32) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT u.name FROM friendships f
             JOIN users u ON u.id = f.to_friend
             WHERE f.from_friend = ?
             ORDER BY u.name",
        )?;

        let names = stmt
            .query_map(params![user_id], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }}

    db_method! {friend_bookmarks(
        &self,
        conn,
        user_id : u32
    ) -> Result<Vec<models::Entry>> {
        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(
                entry_select!(),
                " JOIN friendships f ON f.to_friend = b.user_id
                  WHERE f.from_friend = ? ORDER BY b.id DESC LIMIT ?"
            ),
            params![user_id, LISTING_LIMIT],
        )?;

        attach_tags(&conn, rows)
    }}

    db_method! {is_friend(&self, conn, from : u32, to : u32) -> Result<bool> {
        Ok(conn
            .prepare_cached(
                "SELECT 1 FROM friendships WHERE from_friend = ? AND to_friend = ?",
            )?
            .exists(params![from, to])?)
    }}

    db_method! {add_friend(
        &self,
        conn,
        from : u32,
        to : &models::User
    ) -> Result<()> {
        conn
            .prepare_cached(
                "INSERT INTO friendships (from_friend, to_friend) VALUES (?, ?)",
            )?
            .execute(params![from, to.id])
            .map_err(|err| {
                if error_code_match(
                    &err,
                    ffi::ErrorCode::ConstraintViolation,
                    SQLITE_CONSTRAINT_UNIQUE,
                ) {
                    Error::DuplicateFriend(to.name.clone())
                } else {
                    err.into()
                }
            })?;
        Ok(())
    }}

    db_method! {insert_invitation(
        &self,
        conn,
        name : &str,
        email : &str,
        code : &str,
        sender_id : u32
    ) -> Result<models::Invitation> {
        conn
            .prepare_cached(
                "INSERT INTO invitations (name, email, code, sender_id)
                 VALUES (?, ?, ?, ?)",
            )?
            .execute(params![name, email, code, sender_id])?;

        Ok(models::Invitation {
            id : conn.last_insert_rowid() as u32,
            name : name.to_string(),
            email : email.to_string(),
            code : code.to_string(),
            sender_id,
        })
    }}

    db_method! {get_invitation_by_code(
        &self,
        conn,
        code : &str
    ) -> Result<models::Invitation> {
        find_invitation(&conn, code)?
            .ok_or_else(|| Error::InvitationNotFound(code.to_string()))
    }}

    db_method! {recent_bookmarks(&self, conn) -> Result<Vec<models::Entry>> {
        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(entry_select!(), " ORDER BY b.id DESC LIMIT ?"),
            params![LISTING_LIMIT],
        )?;

        attach_tags(&conn, rows)
    }}

    db_method! {user_recent_bookmarks(
        &self,
        conn,
        user_id : u32
    ) -> Result<Vec<models::Entry>> {
        let rows : Vec<EntryRow> = query_rows(
            &conn,
            concat!(entry_select!(), " WHERE b.user_id = ? ORDER BY b.id DESC LIMIT ?"),
            params![user_id, LISTING_LIMIT],
        )?;

        attach_tags(&conn, rows)
    }}
}

fn create_user(
    conn : &Connection,
    name : &str,
    email : &str,
    password : &str,
) -> Result<models::User> {
    conn
        .prepare_cached("INSERT INTO users (name, email, password) VALUES (?, ?, ?)")?
        .execute(params![name, email, password])
        .map_err(|err| {
            if error_code_match(
                &err,
                ffi::ErrorCode::ConstraintViolation,
                SQLITE_CONSTRAINT_UNIQUE,
            ) {
                Error::DuplicateName(name.to_string())
            } else {
                err.into()
            }
        })?;

    user_by_id(conn, conn.last_insert_rowid() as u32)
}

fn user_by_id(conn : &Connection, user_id : u32) -> Result<models::User> {
    let mut stmt = conn
        .prepare_cached("SELECT * FROM users WHERE users.id = ?")?;

    let mut rows = stmt.query(params![user_id])?;

    let row = rows.next()?
        .ok_or(Error::UserIdNotFound(user_id))?;

    row_parse(row)
}

fn find_invitation(
    conn : &Connection,
    code : &str,
) -> Result<Option<models::Invitation>> {
    let mut invitations : Vec<models::Invitation> = query_rows(
        conn,
        "SELECT * FROM invitations WHERE code = ? ORDER BY id LIMIT 1",
        params![code],
    )?;

    Ok(invitations.pop())
}

fn get_or_create_link(conn : &Connection, url : &str) -> Result<models::Link> {
    conn.prepare_cached("INSERT OR IGNORE INTO links (url) VALUES (?)")?
        .execute(params![url])?;

    let mut links : Vec<models::Link> = query_rows(
        conn,
        "SELECT * FROM links WHERE url = ?",
        params![url],
    )?;

    links.pop().ok_or(Error::Internal)
}

fn get_or_create_tag(conn : &Connection, name : &str) -> Result<models::Tag> {
    conn.prepare_cached("INSERT OR IGNORE INTO tags (name) VALUES (?)")?
        .execute(params![name])?;

    let mut tags : Vec<models::Tag> = query_rows(
        conn,
        "SELECT * FROM tags WHERE name = ?",
        params![name],
    )?;

    tags.pop().ok_or(Error::Internal)
}

fn entry_by_id(conn : &Connection, bookmark_id : u32) -> Result<models::Entry> {
    let rows : Vec<EntryRow> = query_rows(
        conn,
        concat!(entry_select!(), " WHERE b.id = ?"),
        params![bookmark_id],
    )?;

    attach_tags(conn, rows)?.pop().ok_or(Error::Internal)
}

fn query_rows<T : FromRow, P : rusqlite::Params>(
    conn : &Connection,
    sql : &str,
    params : P,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row_parse::<T>(row)?);
    }

    Ok(out)
}

struct EntryRow {
    id :       u32,
    title :    String,
    url :      String,
    username : String,
}

struct SharedRow {
    id :    u32,
    date :  models::Time,
    votes : u32,
}

fn tags_of(conn : &Connection, bookmark_id : u32) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM tags t
         JOIN bookmark_tags bt ON bt.tag_id = t.id
         WHERE bt.bookmark_id = ?
         ORDER BY t.name",
    )?;

    let tags = stmt
        .query_map(params![bookmark_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(tags)
}

fn attach_tags(
    conn : &Connection,
    rows : Vec<EntryRow>,
) -> Result<Vec<models::Entry>> {
    rows.into_iter()
        .map(|row| {
            Ok(models::Entry {
                tags :     tags_of(conn, row.id)?,
                id :       row.id,
                title :    row.title,
                url :      row.url,
                username : row.username,
            })
        })
        .collect()
}

fn attach_shared(
    conn : &Connection,
    rows : Vec<(SharedRow, EntryRow)>,
) -> Result<Vec<models::SharedEntry>> {
    rows.into_iter()
        .map(|(shared, row)| {
            let mut entries = attach_tags(conn, vec![row])?;

            Ok(models::SharedEntry {
                id :       shared.id,
                date :     shared.date,
                votes :    shared.votes,
                bookmark : entries.pop().ok_or(Error::Internal)?,
            })
        })
        .collect()
}

/// A result row seen from a column offset, so tuples of row types can be
/// read out of one joined select.
struct Row<'a> {
    off :   usize,
    inner : &'a rusqlite::Row<'a>,
    cols :  Vec<&'a str>,
}

impl<'a> From<&'a rusqlite::Row<'a>> for Row<'a> {
    fn from(r : &'a rusqlite::Row<'a>) -> Row<'a> {
        Row {
            off :   0,
            cols :  r.as_ref().column_names(),
            inner : r,
        }
    }
}

fn row_parse<'a, T : FromRow>(row : &'a rusqlite::Row<'a>) -> Result<T> {
    T::from_row(&mut row.into())
}

impl<'a> Row<'a> {
    fn column_names(&self) -> &[&'a str] {
        &self.cols[self.off.min(self.cols.len())..]
    }

    /// Reads the first column called `name` at or after the offset.
    fn get<T : FromSql>(&self, name : &str) -> rusqlite::Result<T> {
        let idx = self
            .column_names()
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| rusqlite::Error::InvalidColumnName(name.to_string()))?;

        self.inner.get(idx + self.off)
    }

    fn advance(&mut self, n : usize) {
        self.off += n;
    }
}

trait FromRow: Sized {
    fn column_count() -> usize;
    fn from_row(row : &mut Row) -> Result<Self>;
}

impl<T, U> FromRow for (T, U)
where
    T : FromRow,
    U : FromRow,
{
    fn column_count() -> usize {
        T::column_count() + U::column_count()
    }

    fn from_row(row : &mut Row) -> Result<Self> {
        let t = T::from_row(row)?;
        row.advance(T::column_count());
        let u = U::from_row(row)?;

        Ok((t, u))
    }
}

macro_rules! impl_from_row {
        ($ty:ty { $($field:ident),* }) => {

            impl FromRow for $ty {
                fn column_count() -> usize {
                    const N : usize = [
                        $(
                            stringify!($field),
                        )*
                    ].len();

                    N
                }

                fn from_row(row : &mut Row) -> Result<$ty> {
                    Ok(Self{
                    $(
                        $field : row.get(stringify!($field))?,
                    )*
                    })
                }
            }
        }
    }

impl_from_row! {models::User {
    id, name, email, password, token_version, created
}}

impl_from_row! {models::Link {
    id, url
}}

impl_from_row! {models::Tag {
    id, name
}}

impl_from_row! {models::Invitation {
    id, name, email, code, sender_id
}}

impl_from_row! {models::Comment {
    id, username, text, created
}}

impl_from_row! {models::TagCount {
    name, count
}}

impl_from_row! {EntryRow {
    id, title, url, username
}}

impl_from_row! {SharedRow {
    id, date, votes
}}

impl FromSql for models::Time {
    fn column_result(value : ValueRef) -> FromSqlResult<models::Time> {
        let s : String = String::column_result(value)?;

        let dt = time::PrimitiveDateTime::parse(&s, &TIME_FORMAT)
            .map_err(|err| FromSqlError::Other(Box::new(err)))?;

        Ok(dt.assume_offset(time::UtcOffset::UTC).into())
    }
}
