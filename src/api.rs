use std::convert::Infallible;
use std::sync::Arc;

use cookie::{Cookie, SameSite};
use http::{header, HeaderValue, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use warp::filters::method;
use warp::path::FullPath;
use warp::reject::Reject;
use warp::reply::{self, Response};
use warp::{filters, Filter, Rejection, Reply};

use crate::error::{Error, ErrorCell};
use crate::forms::{
    self, BookmarkForm, CommentForm, FormErrors, InviteForm, LoginForm,
    RegistrationForm, SearchForm,
};
use crate::mail::Mailer;
use crate::{cloud, crypto, database, models, ui, Result};

pub const COOKIE_NAME : &str = "bookmarks-token";
pub const FLASH_COOKIE : &str = "bookmarks-flash";
pub const INVITATION_COOKIE : &str = "bookmarks-invitation";

const FORM_LIMIT : u64 = 16 * 1024;

type BoxReply = Box<dyn Reply>;
type HandlerResult = std::result::Result<BoxReply, Infallible>;

pub struct ServerInner {
    pub server_name :  String,
    /// Base URL without a trailing slash.
    pub site_url :     String,
    pub token_secret : Vec<u8>,
    pub db :           database::Db,
    pub render :       ui::Renderer,
    pub mailer :       Box<dyn Mailer>,
}

pub type Server = Arc<ServerInner>;

/// Who is asking, and the one-shot message left for them by the last
/// redirect.
#[derive(Debug, Default)]
pub struct Session {
    pub user :  Option<models::User>,
    pub flash : Option<String>,
}

fn with_server(
    server : &Server,
) -> impl Filter<Extract = (Server,), Error = Infallible> + Clone {
    let server = Arc::clone(server);
    warp::any().map(move || Arc::clone(&server))
}

async fn authenticate(
    server : &ServerInner,
    token : &str,
) -> Result<Option<models::User>> {
    let tok = match crypto::Token::decode(
        token,
        &server.token_secret,
        &server.server_name,
    ) {
        Ok(tok) => tok,
        Err(err) => {
            debug!(?err, "rejected session token");
            return Ok(None);
        },
    };

    let user_id = match tok.user_id() {
        Some(id) => id,
        None => return Ok(None),
    };

    match server.db.get_user(user_id).await {
        Ok(user) if tok.matches(&user) => Ok(Some(user)),
        Ok(_) | Err(Error::UserIdNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn with_session(
    server : &Server,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    with_server(server)
        .and(filters::cookie::optional(COOKIE_NAME))
        .and(filters::cookie::optional(FLASH_COOKIE))
        .and_then(
            |server : Server, token : Option<String>, flash : Option<String>| async move {
                let user = match token {
                    Some(token) => authenticate(&server, &token).await?,
                    None => None,
                };

                Ok::<_, Rejection>(Session {
                    user,
                    flash : flash.map(|f| decode(&f)).filter(|f| !f.is_empty()),
                })
            },
        )
}

/// Like `with_session`, but anonymous visitors are sent to the login page
/// and come back to the same URL afterwards.
fn with_login(
    server : &Server,
) -> impl Filter<Extract = (models::User, Session), Error = Rejection> + Clone {
    let query = warp::query::raw()
        .map(Some)
        .or(warp::any().map(|| None::<String>))
        .unify();

    with_session(server)
        .and(warp::path::full())
        .and(query)
        .and_then(
            |session : Session, path : FullPath, query : Option<String>| async move {
                match session.user.clone() {
                    Some(user) => Ok((user, session)),
                    None => {
                        let next = match query {
                            Some(q) => format!("{}?{}", path.as_str(), q),
                            None => path.as_str().to_string(),
                        };
                        Err(Rejection::from(Error::LoginRequired(next)))
                    },
                }
            },
        )
        .untuple_one()
}

fn form_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T : serde::de::DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(FORM_LIMIT).and(filters::body::form())
}

fn respond(res : Result<BoxReply>) -> HandlerResult {
    Ok(res.unwrap_or_else(|err| -> BoxReply { Box::new(err) }))
}

fn decode(s : &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn encode(s : &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn user_path(name : &str) -> String {
    format!("/user/{}/", encode(name))
}

fn friends_path(name : &str) -> String {
    format!("/friends/{}/", encode(name))
}

fn cookie(name : &'static str, value : String) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .finish()
}

fn expired(name : &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(cookie::time::Duration::ZERO)
        .finish()
}

fn flash(message : &str) -> Cookie<'static> {
    cookie(FLASH_COOKIE, encode(message))
}

/// A rendered page. Showing a flash message uses it up.
struct Page {
    html :        String,
    status :      StatusCode,
    clear_flash : bool,
}

impl Reply for Page {
    fn into_response(self) -> Response {
        let mut res =
            reply::with_status(reply::html(self.html), self.status).into_response();

        if self.clear_flash {
            if let Ok(v) = HeaderValue::try_from(expired(FLASH_COOKIE).to_string()) {
                res.headers_mut().append(header::SET_COOKIE, v);
            }
        }

        res
    }
}

fn html_page(session : &Session, html : String) -> BoxReply {
    Box::new(Page {
        html,
        status : StatusCode::OK,
        clear_flash : session.flash.is_some(),
    })
}

/// 303 to `location`, setting any number of cookies on the way.
pub struct Redirect {
    location : String,
    cookies :  Vec<Cookie<'static>>,
}

impl Redirect {
    pub fn to(location : impl Into<String>) -> Self {
        Redirect {
            location : location.into(),
            cookies :  Vec::new(),
        }
    }

    pub fn cookie(mut self, c : Cookie<'static>) -> Self {
        self.cookies.push(c);
        self
    }
}

impl Reply for Redirect {
    fn into_response(self) -> Response {
        let mut res = reply::with_status("", StatusCode::SEE_OTHER).into_response();

        match HeaderValue::try_from(self.location) {
            Ok(v) => {
                res.headers_mut().insert(header::LOCATION, v);
            },
            Err(err) => {
                error!(%err, "bad redirect location");
                return Error::Internal.into_response();
            },
        }

        for c in self.cookies {
            if let Ok(v) = HeaderValue::try_from(c.to_string()) {
                res.headers_mut().append(header::SET_COOKIE, v);
            }
        }

        res
    }
}

macro_rules! handler {
    ($name:ident ( $($aname:ident : $atype:ty),*) $body:block) => {
        pub fn $name (
            $(
                $aname : $atype,
            )*
        ) -> impl Filter<Extract = (BoxReply,) , Error = Rejection> + Clone {
            $body
        }
    }
}

macro_rules! handler_or{
    ($head:expr $(, $tail:expr)*) => {
        $head
        $(
            .or($tail)
            .unify()
            .boxed()
        )*
    };
    ($head:expr $(, $tail:expr)*,) => {
        handler_or!($head $(, $tail)*)
    }
}

pub fn routes(
    server : &Server,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    handler_or!(
        get_main(server),
        get_popular(server),
        get_user(server),
        get_tag_cloud(server),
        get_tag(server),
        get_search(server),
        get_bookmark(server),
        post_comment(server),
        get_save(server),
        post_save(server),
        get_vote(server),
        get_friends(server),
        get_friend_add(server),
        get_friend_invite(server),
        post_friend_invite(server),
        get_friend_accept(server),
        get_login(server),
        post_login(server),
        get_logout(server),
        get_register(server),
        post_register(server),
        get_register_success(server),
        get_tag_autocomplete(server),
        get_feed_recent(server),
        get_feed_user(server),
    )
    .recover(recover)
    .with(warp::log::custom(|info| {
        info!(
            status = info.status().as_u16(),
            method = %info.method(),
            path = info.path(),
            elapsed = ?info.elapsed(),
            "request"
        );
    }))
}

async fn recover(err : Rejection) -> std::result::Result<Error, Rejection> {
    use warp::filters::body::BodyDeserializeError;
    use warp::reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge,
        UnsupportedMediaType,
    };
    use Error::*;

    let err = if let Some(cell) = err.find::<ErrorCell>() {
        cell.take().unwrap_or(Internal)
    } else if err.is_not_found() || err.find::<MethodNotAllowed>().is_some() {
        RouteNotFound
    } else if err.find::<InvalidQuery>().is_some()
        || err.find::<BodyDeserializeError>().is_some()
        || err.find::<UnsupportedMediaType>().is_some()
        || err.find::<LengthRequired>().is_some()
        || err.find::<PayloadTooLarge>().is_some()
    {
        BadRequest
    } else {
        warn!(?err, "unhandled rejection");
        Internal
    };

    Ok(err)
}

handler! { get_main (server : &Server) {
    warp::path::end()
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|server : Server, session : Session| async move {
            respond(main_page(&server, &session).await)
        })
}}

async fn main_page(server : &ServerInner, session : &Session) -> Result<BoxReply> {
    let shared = server.db.recent_shared().await?;

    Ok(html_page(session, server.render.main_page(session, &shared)?))
}

handler! { get_popular (server : &Server) {
    warp::path!("popular")
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|server : Server, session : Session| async move {
            respond(popular_page(&server, &session).await)
        })
}}

async fn popular_page(
    server : &ServerInner,
    session : &Session,
) -> Result<BoxReply> {
    let shared = server.db.popular_shared().await?;

    Ok(html_page(session, server.render.popular_page(session, &shared)?))
}

#[derive(Deserialize)]
struct PageQuery {
    page : Option<String>,
}

handler! { get_user (server : &Server) {
    warp::path!("user" / String)
        .and(method::get())
        .and(warp::query::<PageQuery>())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|
            name : String,
            query : PageQuery,
            server : Server,
            session : Session
        | async move {
            respond(
                user_page(&server, &session, &decode(&name), query.page.as_deref())
                    .await,
            )
        })
}}

async fn user_page(
    server : &ServerInner,
    session : &Session,
    name : &str,
    page : Option<&str>,
) -> Result<BoxReply> {
    let user = server.db.get_user_by_name(name).await?;
    let bookmarks = server.db.user_bookmarks(user.id, page).await?;

    let is_friend = match &session.user {
        Some(me) => server.db.is_friend(me.id, user.id).await?,
        None => false,
    };

    let html = server
        .render
        .user_page(session, &user.name, &bookmarks, is_friend)?;

    Ok(html_page(session, html))
}

handler! { get_tag_cloud (server : &Server) {
    warp::path!("tag")
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|server : Server, session : Session| async move {
            respond(tag_cloud_page(&server, &session).await)
        })
}}

async fn tag_cloud_page(
    server : &ServerInner,
    session : &Session,
) -> Result<BoxReply> {
    let counts = server.db.tag_counts().await?;
    let tags = cloud::weigh(counts, cloud::MAX_WEIGHT);

    Ok(html_page(session, server.render.tag_cloud_page(session, &tags)?))
}

handler! { get_tag (server : &Server) {
    warp::path!("tag" / String)
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|name : String, server : Server, session : Session| async move {
            respond(tag_page(&server, &session, &decode(&name)).await)
        })
}}

async fn tag_page(
    server : &ServerInner,
    session : &Session,
    name : &str,
) -> Result<BoxReply> {
    let bookmarks = server.db.tag_bookmarks(name).await?;

    Ok(html_page(session, server.render.tag_page(session, name, &bookmarks)?))
}

handler! { get_search (server : &Server) {
    warp::path!("search")
        .and(method::get())
        .and(warp::query::<SearchForm>())
        .and(filters::header::optional::<String>("x-requested-with"))
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|
            form : SearchForm,
            requested_with : Option<String>,
            server : Server,
            session : Session
        | async move {
            let ajax = requested_with.as_deref() == Some("XMLHttpRequest");
            respond(search_page(&server, &session, form, ajax).await)
        })
}}

async fn search_page(
    server : &ServerInner,
    session : &Session,
    form : SearchForm,
    ajax : bool,
) -> Result<BoxReply> {
    let show_results = form.query.is_some();
    let keywords = form.keywords();

    let bookmarks = if keywords.is_empty() {
        Vec::new()
    } else {
        server.db.search(&keywords).await?
    };

    if ajax {
        return Ok(Box::new(reply::html(
            server.render.bookmark_list(&bookmarks, false)?,
        )));
    }

    let query = form.query.as_deref().unwrap_or("").trim();
    let html = server
        .render
        .search_page(session, query, &bookmarks, show_results)?;

    Ok(html_page(session, html))
}

handler! { get_bookmark (server : &Server) {
    warp::path!("bookmark" / u32)
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|id : u32, server : Server, session : Session| async move {
            respond(bookmark_page(&server, &session, id).await)
        })
}}

async fn bookmark_page(
    server : &ServerInner,
    session : &Session,
    id : u32,
) -> Result<BoxReply> {
    let shared = server.db.get_shared(id).await?;
    let comments = server.db.comments_for(id).await?;

    let html = server.render.bookmark_page(
        session,
        &shared,
        &comments,
        &CommentForm::default(),
        &FormErrors::default(),
    )?;

    Ok(html_page(session, html))
}

handler! { post_comment (server : &Server) {
    warp::path!("bookmark" / u32 / "comment")
        .and(method::post())
        .and(with_server(server))
        .and(with_login(server))
        .and(form_body())
        .and_then(|
            id : u32,
            server : Server,
            user : models::User,
            session : Session,
            form : CommentForm
        | async move {
            respond(post_comment_form(&server, &user, &session, id, form).await)
        })
}}

async fn post_comment_form(
    server : &ServerInner,
    user : &models::User,
    session : &Session,
    id : u32,
    form : CommentForm,
) -> Result<BoxReply> {
    let text = match form.clean() {
        Ok(text) => text,
        Err(errors) => {
            let shared = server.db.get_shared(id).await?;
            let comments = server.db.comments_for(id).await?;
            let html = server
                .render
                .bookmark_page(session, &shared, &comments, &form, &errors)?;

            return Ok(html_page(session, html));
        },
    };

    let comment = server.db.add_comment(id, user.id, &text).await?;
    info!(user = %user.name, shared = id, "comment posted");

    Ok(Box::new(Redirect::to(format!("/bookmark/{}/#c{}", id, comment.id))))
}

#[derive(Deserialize)]
struct SaveQuery {
    url :  Option<String>,
    ajax : Option<String>,
}

handler! { get_save (server : &Server) {
    warp::path!("save")
        .and(method::get())
        .and(warp::query::<SaveQuery>())
        .and(with_server(server))
        .and(with_login(server))
        .and_then(|
            query : SaveQuery,
            server : Server,
            user : models::User,
            session : Session
        | async move {
            respond(save_form_page(&server, &user, &session, query).await)
        })
}}

async fn save_form_page(
    server : &ServerInner,
    user : &models::User,
    session : &Session,
    query : SaveQuery,
) -> Result<BoxReply> {
    let form = match query.url {
        Some(url) => {
            let existing = match forms::normalize_url(&url) {
                Some(u) => server.db.get_bookmark_by_url(user.id, &u).await?,
                None => None,
            };

            match existing {
                Some(b) => BookmarkForm {
                    url,
                    title : b.title,
                    tags : b.tags.join(" "),
                    share : None,
                },
                None => BookmarkForm {
                    url,
                    ..Default::default()
                },
            }
        },
        None => BookmarkForm::default(),
    };

    let errors = FormErrors::default();

    if query.ajax.is_some() {
        return Ok(Box::new(reply::html(
            server.render.save_form(&form, &errors)?,
        )));
    }

    Ok(html_page(session, server.render.save_page(session, &form, &errors)?))
}

handler! { post_save (server : &Server) {
    warp::path!("save")
        .and(method::post())
        .and(warp::query::<SaveQuery>())
        .and(with_server(server))
        .and(with_login(server))
        .and(form_body())
        .and_then(|
            query : SaveQuery,
            server : Server,
            user : models::User,
            session : Session,
            form : BookmarkForm
        | async move {
            let ajax = query.ajax.is_some();
            respond(save_bookmark(&server, &user, &session, form, ajax).await)
        })
}}

async fn save_bookmark(
    server : &ServerInner,
    user : &models::User,
    session : &Session,
    form : BookmarkForm,
    ajax : bool,
) -> Result<BoxReply> {
    let save = match form.clean() {
        Ok(save) => save,
        Err(_) if ajax => return Ok(Box::new("failure")),
        Err(errors) => {
            let html = server.render.save_page(session, &form, &errors)?;
            return Ok(html_page(session, html));
        },
    };

    let entry = server.db.save_bookmark(user.id, &save).await?;
    info!(user = %user.name, url = %entry.url, shared = save.share, "bookmark saved");

    if ajax {
        let html = server.render.bookmark_list(&[entry], true)?;
        return Ok(Box::new(reply::html(html)));
    }

    Ok(Box::new(Redirect::to(user_path(&user.name))))
}

#[derive(Deserialize)]
struct VoteQuery {
    id : Option<String>,
}

handler! { get_vote (server : &Server) {
    warp::path!("vote")
        .and(method::get())
        .and(warp::query::<VoteQuery>())
        .and(filters::header::optional::<String>("referer"))
        .and(with_server(server))
        .and(with_login(server))
        .and_then(|
            query : VoteQuery,
            referer : Option<String>,
            server : Server,
            user : models::User,
            _session : Session
        | async move {
            respond(vote(&server, &user, query, referer).await)
        })
}}

async fn vote(
    server : &ServerInner,
    user : &models::User,
    query : VoteQuery,
    referer : Option<String>,
) -> Result<BoxReply> {
    if let Some(id) = query.id {
        let id = id.trim().parse::<u32>().map_err(|_| Error::BadRequest)?;

        if server.db.vote(id, user.id).await? {
            debug!(user = %user.name, shared = id, "vote counted");
        }
    }

    Ok(Box::new(Redirect::to(referer.unwrap_or_else(|| "/".to_string()))))
}

handler! { get_friends (server : &Server) {
    warp::path!("friends" / String)
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|name : String, server : Server, session : Session| async move {
            respond(friends_page(&server, &session, &decode(&name)).await)
        })
}}

async fn friends_page(
    server : &ServerInner,
    session : &Session,
    name : &str,
) -> Result<BoxReply> {
    let user = server.db.get_user_by_name(name).await?;
    let friends = server.db.friends_of(user.id).await?;
    let bookmarks = server.db.friend_bookmarks(user.id).await?;

    let html = server
        .render
        .friends_page(session, &user.name, &friends, &bookmarks)?;

    Ok(html_page(session, html))
}

#[derive(Deserialize)]
struct FriendQuery {
    username : Option<String>,
}

handler! { get_friend_add (server : &Server) {
    warp::path!("friend" / "add")
        .and(method::get())
        .and(warp::query::<FriendQuery>())
        .and(with_server(server))
        .and(with_login(server))
        .and_then(|
            query : FriendQuery,
            server : Server,
            user : models::User,
            _session : Session
        | async move {
            respond(friend_add(&server, &user, query).await)
        })
}}

async fn friend_add(
    server : &ServerInner,
    user : &models::User,
    query : FriendQuery,
) -> Result<BoxReply> {
    let name = query.username.ok_or(Error::RouteNotFound)?;
    let friend = server.db.get_user_by_name(&name).await?;

    let message = match server.db.add_friend(user.id, &friend).await {
        Ok(()) => format!("{} was added to your friend list.", friend.name),
        Err(Error::DuplicateFriend(_)) => {
            format!("{} is already a friend of yours.", friend.name)
        },
        Err(err) => return Err(err),
    };

    Ok(Box::new(
        Redirect::to(friends_path(&user.name)).cookie(flash(&message)),
    ))
}

handler! { get_friend_invite (server : &Server) {
    warp::path!("friend" / "invite")
        .and(method::get())
        .and(with_server(server))
        .and(with_login(server))
        .and_then(|server : Server, _user : models::User, session : Session| async move {
            let html = server.render.friend_invite_page(
                &session,
                &InviteForm::default(),
                &FormErrors::default(),
            );
            respond(html.map(|html| html_page(&session, html)))
        })
}}

handler! { post_friend_invite (server : &Server) {
    warp::path!("friend" / "invite")
        .and(method::post())
        .and(with_server(server))
        .and(with_login(server))
        .and(form_body())
        .and_then(|
            server : Server,
            user : models::User,
            session : Session,
            form : InviteForm
        | async move {
            respond(friend_invite(&server, &user, &session, form).await)
        })
}}

async fn friend_invite(
    server : &ServerInner,
    user : &models::User,
    session : &Session,
    form : InviteForm,
) -> Result<BoxReply> {
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => {
            let html = server.render.friend_invite_page(session, &form, &errors)?;
            return Ok(html_page(session, html));
        },
    };

    let code = crypto::random_code(crypto::INVITATION_CODE_LEN);
    let invitation = server
        .db
        .insert_invitation(&new.name, &new.email, &code, user.id)
        .await?;

    let message = match send_invitation(server, &invitation, &user.name) {
        Ok(()) => format!("An invitation was sent to {}.", invitation.email),
        Err(err) => {
            warn!(?err, to = %invitation.email, "failed to send invitation");
            "There was an error while sending the invitation.".to_string()
        },
    };

    Ok(Box::new(Redirect::to("/friend/invite/").cookie(flash(&message))))
}

fn send_invitation(
    server : &ServerInner,
    invitation : &models::Invitation,
    sender : &str,
) -> Result<()> {
    let link = format!("{}/friend/accept/{}/", server.site_url, invitation.code);
    let mail = server.render.invitation_mail(invitation, sender, &link)?;

    tokio::task::block_in_place(|| server.mailer.send(&mail))
}

handler! { get_friend_accept (server : &Server) {
    warp::path!("friend" / "accept" / String)
        .and(method::get())
        .and(with_server(server))
        .and_then(|code : String, server : Server| async move {
            respond(friend_accept(&server, &decode(&code)).await)
        })
}}

async fn friend_accept(server : &ServerInner, code : &str) -> Result<BoxReply> {
    let invitation = server.db.get_invitation_by_code(code).await?;

    Ok(Box::new(
        Redirect::to("/register/")
            .cookie(cookie(INVITATION_COOKIE, invitation.code)),
    ))
}

#[derive(Deserialize)]
struct LoginQuery {
    next : Option<String>,
}

handler! { get_login (server : &Server) {
    warp::path!("login")
        .and(method::get())
        .and(warp::query::<LoginQuery>())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|query : LoginQuery, server : Server, session : Session| async move {
            let next = forms::safe_next(query.next.as_deref());
            let html = server.render.login_page(&session, "", next, false);
            respond(html.map(|html| html_page(&session, html)))
        })
}}

handler! { post_login (server : &Server) {
    warp::path!("login")
        .and(method::post())
        .and(with_server(server))
        .and(with_session(server))
        .and(form_body())
        .and_then(|server : Server, session : Session, form : LoginForm| async move {
            respond(login(&server, &session, form).await)
        })
}}

async fn login(
    server : &ServerInner,
    session : &Session,
    form : LoginForm,
) -> Result<BoxReply> {
    let next = forms::safe_next(form.next.as_deref());

    let user = match server.db.get_user_by_name(form.username.trim()).await {
        Ok(user) => Some(user),
        Err(Error::UserNameNotFound(_)) => None,
        Err(err) => return Err(err),
    };

    let verified = match &user {
        Some(user) => {
            crypto::verify_password(&user.password, &form.password)?
        },
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            debug!(username = %form.username, "failed login");
            let html = server.render.login_page(session, &form.username, next, true)?;

            return Ok(Box::new(Page {
                html,
                status : StatusCode::UNAUTHORIZED,
                clear_flash : session.flash.is_some(),
            }));
        },
    };

    let tok = crypto::Token::for_user(
        &user,
        &server.server_name,
        crypto::Token::session_lifetime(),
    )?
    .encode(&server.token_secret)?;

    info!(user = %user.name, "logged in");

    let mut session_cookie = cookie(COOKIE_NAME, tok);
    session_cookie.set_max_age(cookie::time::Duration::days(crypto::SESSION_DAYS as i64));

    Ok(Box::new(Redirect::to(next).cookie(session_cookie)))
}

handler! { get_logout (server : &Server) {
    warp::path!("logout")
        .and(method::get())
        .and(with_session(server))
        .map(|session : Session| -> BoxReply {
            if let Some(user) = &session.user {
                info!(user = %user.name, "logged out");
            }
            Box::new(Redirect::to("/").cookie(expired(COOKIE_NAME)))
        })
}}

async fn pending_invitation(
    server : &ServerInner,
    code : Option<&str>,
) -> Result<Option<models::Invitation>> {
    let code = match code {
        Some(code) => code,
        None => return Ok(None),
    };

    match server.db.get_invitation_by_code(code).await {
        Ok(invitation) => Ok(Some(invitation)),
        Err(Error::InvitationNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

handler! { get_register (server : &Server) {
    warp::path!("register")
        .and(method::get())
        .and(filters::cookie::optional(INVITATION_COOKIE))
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|code : Option<String>, server : Server, session : Session| async move {
            respond(register_page(&server, &session, code.as_deref()).await)
        })
}}

async fn register_page(
    server : &ServerInner,
    session : &Session,
    code : Option<&str>,
) -> Result<BoxReply> {
    let invitation = pending_invitation(server, code).await?;

    let html = server.render.register_page(
        session,
        &RegistrationForm::default(),
        &FormErrors::default(),
        invitation.as_ref(),
    )?;

    Ok(html_page(session, html))
}

handler! { post_register (server : &Server) {
    warp::path!("register")
        .and(method::post())
        .and(filters::cookie::optional(INVITATION_COOKIE))
        .and(with_server(server))
        .and(with_session(server))
        .and(form_body())
        .and_then(|
            code : Option<String>,
            server : Server,
            session : Session,
            form : RegistrationForm
        | async move {
            respond(register(&server, &session, code.as_deref(), form).await)
        })
}}

async fn register(
    server : &ServerInner,
    session : &Session,
    code : Option<&str>,
    form : RegistrationForm,
) -> Result<BoxReply> {
    let taken = match server.db.get_user_by_name(form.username.trim()).await {
        Ok(_) => true,
        Err(Error::UserNameNotFound(_)) => false,
        Err(err) => return Err(err),
    };

    let (new, mut errors) = match form.clean() {
        Ok(new) => (Some(new), FormErrors::default()),
        Err(errors) => (None, errors),
    };

    if taken {
        errors.add("username", "Username is already taken.");
    }

    if let (Some(new), true) = (new, errors.is_empty()) {
        let password = crypto::hash_password(&new.password)?;

        match server
            .db
            .register_user(&new.username, &new.email, &password, code)
            .await
        {
            Ok(user) => {
                info!(user = %user.name, invited = code.is_some(), "registered");

                let mut redirect = Redirect::to("/register/success/");
                if code.is_some() {
                    redirect = redirect.cookie(expired(INVITATION_COOKIE));
                }

                return Ok(Box::new(redirect));
            },
            Err(Error::DuplicateName(_)) => {
                errors.add("username", "Username is already taken.");
            },
            Err(err) => return Err(err),
        }
    }

    let invitation = pending_invitation(server, code).await?;
    let html = server
        .render
        .register_page(session, &form, &errors, invitation.as_ref())?;

    Ok(html_page(session, html))
}

handler! { get_register_success (server : &Server) {
    warp::path!("register" / "success")
        .and(method::get())
        .and(with_server(server))
        .and(with_session(server))
        .and_then(|server : Server, session : Session| async move {
            let html = server.render.register_success_page(&session);
            respond(html.map(|html| html_page(&session, html)))
        })
}}

#[derive(Deserialize)]
struct AutocompleteQuery {
    q : Option<String>,
}

handler! { get_tag_autocomplete (server : &Server) {
    warp::path!("ajax" / "tag" / "autocomplete")
        .and(method::get())
        .and(warp::query::<AutocompleteQuery>())
        .and(with_server(server))
        .and_then(|query : AutocompleteQuery, server : Server| async move {
            let names = match query.q {
                Some(q) => server.db.autocomplete_tags(&q).await,
                None => Ok(Vec::new()),
            };

            respond(names.map(|names| -> BoxReply { Box::new(names.join("\n")) }))
        })
}}

fn rss(xml : String) -> BoxReply {
    Box::new(reply::with_header(
        xml,
        header::CONTENT_TYPE,
        "application/rss+xml; charset=utf-8",
    ))
}

handler! { get_feed_recent (server : &Server) {
    warp::path!("feeds" / "recent")
        .and(method::get())
        .and(with_server(server))
        .and_then(|server : Server| async move {
            respond(feed_recent(&server).await)
        })
}}

async fn feed_recent(server : &ServerInner) -> Result<BoxReply> {
    let bookmarks = server.db.recent_bookmarks().await?;

    let channel = ui::Channel {
        title :       format!("{} | Recent Bookmarks", ui::SITE_NAME),
        link :        format!("{}/feeds/recent/", server.site_url),
        description : format!("Recent bookmarks posted to {}", ui::SITE_NAME),
    };

    Ok(rss(server.render.feed(&channel, &server.site_url, &bookmarks)?))
}

handler! { get_feed_user (server : &Server) {
    warp::path!("feeds" / "user" / String)
        .and(method::get())
        .and(with_server(server))
        .and_then(|name : String, server : Server| async move {
            respond(feed_user(&server, &decode(&name)).await)
        })
}}

async fn feed_user(server : &ServerInner, name : &str) -> Result<BoxReply> {
    let user = server.db.get_user_by_name(name).await?;
    let bookmarks = server.db.user_recent_bookmarks(user.id).await?;

    let channel = ui::Channel {
        title :       format!("{} | Bookmarks by {}", ui::SITE_NAME, user.name),
        link :        format!("{}/feeds/user/{}/", server.site_url, encode(&user.name)),
        description : format!("Recent bookmarks posted by {}", user.name),
    };

    Ok(rss(server.render.feed(&channel, &server.site_url, &bookmarks)?))
}

impl Reject for ErrorCell {}

impl From<Error> for Rejection {
    fn from(err : Error) -> Rejection {
        warp::reject::custom(ErrorCell::new(err))
    }
}

impl Reply for Error {
    fn into_response(self) -> warp::reply::Response {
        use http::StatusCode as S;
        use Error::*;

        if let LoginRequired(next) = &self {
            let query = serde_urlencoded::to_string([("next", next.as_str())])
                .unwrap_or_default();
            return Redirect::to(format!("/login/?{}", query)).into_response();
        }

        let status = match &self {
            e if e.is_not_found() => S::NOT_FOUND,
            FailedLogin | Unauthorized => S::UNAUTHORIZED,
            BadRequest => S::BAD_REQUEST,
            DuplicateName(_) | DuplicateFriend(_) => S::CONFLICT,
            _ => S::INTERNAL_SERVER_ERROR,
        };

        if status == S::INTERNAL_SERVER_ERROR {
            error!(err = ?self, "internal error");
        } else {
            debug!(err = ?self, "request failed");
        }

        let message = match &self {
            UserNameNotFound(name) => format!("User not found: {}", name),
            UserIdNotFound(id) => format!("User not found: {}", id),
            TagNotFound(name) => format!("Tag not found: {}", name),
            SharedNotFound(_) => "Bookmark not found.".to_string(),
            InvitationNotFound(_) => "Invitation not found.".to_string(),
            RouteNotFound => "Page not found.".to_string(),
            FailedLogin | Unauthorized => "Unauthorized.".to_string(),
            BadRequest => "Bad request.".to_string(),
            DuplicateName(name) => format!("Name already taken: {}", name),
            DuplicateFriend(name) => format!("{} is already a friend.", name),
            _ => "Internal server error.".to_string(),
        };

        let html = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\
             <body><h1>{}</h1><p><a href=\"/\">Back to the main page</a></p></body></html>",
            status,
            handlebars::html_escape(&message),
        );

        reply::with_status(reply::html(html), status).into_response()
    }
}
