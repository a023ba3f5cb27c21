use std::sync::{Arc, Mutex};

use bookmarks::api::{routes, Server, ServerInner};
use bookmarks::database::Db;
use bookmarks::mail::{Mail, Mailer};
use bookmarks::ui::Renderer;
use bookmarks::{Error, Result};
use warp::test::{request, RequestBuilder};

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<Mail>>>);

impl Mailer for Outbox {
    fn send(&self, mail : &Mail) -> Result<()> {
        self.0.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct BrokenMailer;

impl Mailer for BrokenMailer {
    fn send(&self, _mail : &Mail) -> Result<()> {
        Err(Error::Mail("connection refused".into()))
    }
}

fn server_with(mailer : Box<dyn Mailer>) -> Server {
    Arc::new(ServerInner {
        server_name :  "bookmarks.test".into(),
        site_url :     "http://bookmarks.test".into(),
        token_secret : b"test-secret".to_vec(),
        db :           Db::memory().unwrap(),
        render :       Renderer::new().unwrap(),
        mailer,
    })
}

fn server() -> Server {
    server_with(Box::new(Outbox::default()))
}

fn set_cookie<B>(res : &warp::http::Response<B>, name : &str) -> Option<String> {
    let prefix = format!("{}=", name);

    res.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(|v| v.split(';').next().unwrap().to_string())
}

fn location<B>(res : &warp::http::Response<B>) -> &str {
    res.headers()["location"].to_str().unwrap()
}

fn body<B : AsRef<[u8]>>(res : &warp::http::Response<B>) -> String {
    String::from_utf8_lossy(res.body().as_ref()).into_owned()
}

fn with_cookie(req : RequestBuilder, cookie : &str) -> RequestBuilder {
    if cookie.is_empty() {
        req
    } else {
        req.header("cookie", cookie)
    }
}

async fn post_form(
    server : &Server,
    path : &str,
    cookie : &str,
    form : &str,
) -> warp::http::Response<warp::hyper::body::Bytes> {
    with_cookie(request().method("POST").path(path), cookie)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form)
        .reply(&routes(server))
        .await
}

async fn get(
    server : &Server,
    path : &str,
    cookie : &str,
) -> warp::http::Response<warp::hyper::body::Bytes> {
    with_cookie(request().method("GET").path(path), cookie)
        .reply(&routes(server))
        .await
}

async fn register(server : &Server, name : &str) {
    let form = format!(
        "username={0}&email={0}%40example.com&password1=pw&password2=pw",
        name
    );
    let res = post_form(server, "/register/", "", &form).await;

    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/register/success/");
}

/// Returns the session cookie, ready to send back.
async fn login(server : &Server, name : &str) -> String {
    let form = format!("username={}&password=pw&next=%2F", name);
    let res = post_form(server, "/login/", "", &form).await;

    assert_eq!(res.status(), 303);
    set_cookie(&res, "bookmarks-token").expect("session cookie")
}

async fn save(server : &Server, cookie : &str, form : &str) {
    let res = post_form(server, "/save/", cookie, form).await;
    assert_eq!(res.status(), 303, "{}", body(&res));
}

#[tokio::test(flavor = "multi_thread")]
async fn anonymous_save_redirects_to_login() {
    let server = server();

    let res = get(&server, "/save/?url=http%3A%2F%2Fexample.com", "").await;

    assert_eq!(res.status(), 303);
    assert_eq!(
        location(&res),
        "/login/?next=%2Fsave%2F%3Furl%3Dhttp%253A%252F%252Fexample.com"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn register_login_and_save() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    let res = post_form(
        &server,
        "/save/",
        &cookie,
        "url=https%3A%2F%2Fwww.rust-lang.org%2F&title=Rust+Lang&tags=rust+lang",
    )
    .await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/user/alice/");

    let res = get(&server, "/user/alice/", &cookie).await;
    assert_eq!(res.status(), 200);
    let html = body(&res);
    assert!(html.contains("Rust Lang"));
    assert!(html.contains("/tag/rust/"));
    assert!(html.contains("/logout/"));

    // the edit form comes back prefilled
    let res = get(
        &server,
        "/save/?url=https%3A%2F%2Fwww.rust-lang.org%2F",
        &cookie,
    )
    .await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("lang rust"));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_save_shows_errors() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    let res = post_form(&server, "/save/", &cookie, "url=nope&title=").await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("Enter a valid URL."));

    let res = post_form(&server, "/save/?ajax", &cookie, "url=nope&title=").await;
    assert_eq!(res.status(), 200);
    assert_eq!(body(&res), "failure");
}

#[tokio::test(flavor = "multi_thread")]
async fn ajax_save_returns_fragment() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    let res = post_form(
        &server,
        "/save/?ajax",
        &cookie,
        "url=http%3A%2F%2Fexample.com%2F&title=Example&tags=",
    )
    .await;

    assert_eq!(res.status(), 200);
    let html = body(&res);
    assert!(html.contains("Example"));
    assert!(!html.contains("<html>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_login() {
    let server = server();
    register(&server, "alice").await;

    let res = post_form(&server, "/login/", "", "username=alice&password=wrong").await;
    assert_eq!(res.status(), 401);
    assert!(set_cookie(&res, "bookmarks-token").is_none());

    let res = post_form(&server, "/login/", "", "username=nobody&password=pw").await;
    assert_eq!(res.status(), 401);
}

#[tokio::test(flavor = "multi_thread")]
async fn login_follows_local_next_only() {
    let server = server();
    register(&server, "alice").await;

    let res = post_form(
        &server,
        "/login/",
        "",
        "username=alice&password=pw&next=%2Fsave%2F",
    )
    .await;
    assert_eq!(location(&res), "/save/");

    let res = post_form(
        &server,
        "/login/",
        "",
        "username=alice&password=pw&next=https%3A%2F%2Fevil.example",
    )
    .await;
    assert_eq!(location(&res), "/");

    let res = post_form(
        &server,
        "/login/",
        "",
        "username=alice&password=pw&next=%2F%0D%0ASet-Cookie%3A+x%3Dy",
    )
    .await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/");
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_expires_session_cookie() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    let res = get(&server, "/logout/", &cookie).await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/");
    assert_eq!(
        set_cookie(&res, "bookmarks-token").as_deref(),
        Some("bookmarks-token=")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_token_is_anonymous() {
    let server = server();

    let res = get(&server, "/", "bookmarks-token=not-a-jwt").await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("/register/"));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_registration() {
    let server = server();
    register(&server, "alice").await;

    let res = post_form(
        &server,
        "/register/",
        "",
        "username=alice&email=a%40example.com&password1=pw&password2=pw",
    )
    .await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("Username is already taken."));
}

#[tokio::test(flavor = "multi_thread")]
async fn share_and_vote() {
    let server = server();
    register(&server, "alice").await;
    register(&server, "bob").await;
    let alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;

    save(
        &server,
        &alice,
        "url=http%3A%2F%2Fexample.com%2F&title=Shared+Thing&tags=misc&share=on",
    )
    .await;

    let shared = server.db.recent_shared().await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].votes, 1);
    let id = shared[0].id;

    let res = get(&server, "/", "").await;
    assert!(body(&res).contains("Shared Thing"));

    let vote = format!("/vote/?id={}", id);
    for _ in 0..2 {
        let res = request()
            .method("GET")
            .path(&vote)
            .header("cookie", &bob)
            .header("referer", "/popular/")
            .reply(&routes(&server))
            .await;
        assert_eq!(res.status(), 303);
        assert_eq!(location(&res), "/popular/");
    }

    // sharing already counted as alice's vote
    let res = get(&server, &vote, &alice).await;
    assert_eq!(location(&res), "/");

    assert_eq!(server.db.get_shared(id).await.unwrap().votes, 2);

    let res = get(&server, &format!("/bookmark/{}/", id), "").await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("Shared Thing"));
}

#[tokio::test(flavor = "multi_thread")]
async fn comments() {
    let server = server();
    register(&server, "alice").await;
    register(&server, "bob").await;
    let alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;

    save(
        &server,
        &alice,
        "url=http%3A%2F%2Fexample.com%2F&title=Shared+Thing&share=on",
    )
    .await;
    let id = server.db.recent_shared().await.unwrap()[0].id;
    let page = format!("/bookmark/{}/", id);
    let post = format!("/bookmark/{}/comment/", id);

    let res = get(&server, &page, "").await;
    let html = body(&res);
    assert!(html.contains("No comments yet."));
    assert!(!html.contains("<textarea"));

    let res = post_form(&server, &post, "", "comment=hi").await;
    assert_eq!(res.status(), 303);
    assert!(location(&res).starts_with("/login/?next="));

    let res = post_form(&server, &post, &bob, "comment=++").await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("Comment is required"));

    let res = post_form(&server, &post, &bob, "comment=Great+find%21").await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), format!("/bookmark/{}/#c1", id));

    let res = get(&server, &page, &alice).await;
    let html = body(&res);
    assert!(html.contains("Great find!"));
    assert!(html.contains("id=\"c1\""));
    assert!(html.contains("/user/bob/"));
    assert!(html.contains("<textarea"));

    let res = post_form(&server, "/bookmark/99/comment/", &bob, "comment=hi").await;
    assert_eq!(res.status(), 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_pages() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    for path in ["/popular/", "/register/success/", "/login/", "/register/"] {
        let res = get(&server, path, "").await;
        assert_eq!(res.status(), 200, "{}", path);
        assert!(body(&res).contains("<html"), "{}", path);
    }

    let res = get(&server, "/friend/invite/", &cookie).await;
    assert_eq!(res.status(), 200);
    assert!(body(&res).contains("name=\"email\""));

    let res = get(&server, "/friend/invite/", "").await;
    assert_eq!(res.status(), 303);
}

#[tokio::test(flavor = "multi_thread")]
async fn vote_for_missing_bookmark() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    let res = get(&server, "/vote/?id=42", &cookie).await;
    assert_eq!(res.status(), 404);

    let res = get(&server, "/vote/?id=abc", &cookie).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn add_friend_with_flash() {
    let server = server();
    register(&server, "alice").await;
    register(&server, "bob").await;
    let alice = login(&server, "alice").await;

    let res = get(&server, "/friend/add/?username=bob", &alice).await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/friends/alice/");
    let flash = set_cookie(&res, "bookmarks-flash").unwrap();

    let res = get(&server, "/friends/alice/", &format!("{}; {}", alice, flash)).await;
    assert_eq!(res.status(), 200);
    let html = body(&res);
    assert!(html.contains("bob was added to your friend list."));
    assert_eq!(
        set_cookie(&res, "bookmarks-flash").as_deref(),
        Some("bookmarks-flash=")
    );

    let res = get(&server, "/friend/add/?username=bob", &alice).await;
    let flash = set_cookie(&res, "bookmarks-flash").unwrap();
    assert!(flash.contains("already"));

    let res = get(&server, "/friend/add/?username=nobody", &alice).await;
    assert_eq!(res.status(), 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn friends_see_each_others_bookmarks() {
    let server = server();
    register(&server, "alice").await;
    register(&server, "bob").await;
    let alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;

    save(&server, &bob, "url=http%3A%2F%2Fbob.example%2F&title=Bob+Post&tags=").await;
    get(&server, "/friend/add/?username=bob", &alice).await;

    let res = get(&server, "/friends/alice/", "").await;
    let html = body(&res);
    assert!(html.contains("Bob Post"));

    let res = get(&server, "/user/bob/", &alice).await;
    assert!(body(&res).contains("bob is a friend of yours."));
}

#[tokio::test(flavor = "multi_thread")]
async fn invitation_round_trip() {
    let outbox = Outbox::default();
    let server = server_with(Box::new(outbox.clone()));
    register(&server, "alice").await;
    let alice = login(&server, "alice").await;

    let res = post_form(
        &server,
        "/friend/invite/",
        &alice,
        "name=Carol&email=carol%40example.com",
    )
    .await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/friend/invite/");
    assert!(set_cookie(&res, "bookmarks-flash")
        .unwrap()
        .contains("carol%40example%2Ecom"));

    let mail = outbox.0.lock().unwrap().pop().unwrap();
    assert_eq!(mail.to, "carol@example.com");
    assert!(mail.body.contains("alice invited you"));

    let start = mail.body.find("http://bookmarks.test/friend/accept/").unwrap();
    let link = mail.body[start..].lines().next().unwrap();
    let path = link.trim_start_matches("http://bookmarks.test");

    let res = get(&server, path, "").await;
    assert_eq!(res.status(), 303);
    assert_eq!(location(&res), "/register/");
    let invitation = set_cookie(&res, "bookmarks-invitation").unwrap();

    let res = get(&server, "/register/", &invitation).await;
    assert!(body(&res).contains("Carol"));

    let res = post_form(
        &server,
        "/register/",
        &invitation,
        "username=carol&email=carol%40example.com&password1=pw&password2=pw",
    )
    .await;
    assert_eq!(res.status(), 303);

    let alice = server.db.get_user_by_name("alice").await.unwrap();
    let carol = server.db.get_user_by_name("carol").await.unwrap();
    assert!(server.db.is_friend(alice.id, carol.id).await.unwrap());
    assert!(server.db.is_friend(carol.id, alice.id).await.unwrap());

    // used up
    let res = get(&server, path, "").await;
    assert_eq!(res.status(), 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn invitation_mail_failure_is_flashed() {
    let server = server_with(Box::new(BrokenMailer));
    register(&server, "alice").await;
    let alice = login(&server, "alice").await;

    let res = post_form(
        &server,
        "/friend/invite/",
        &alice,
        "name=Carol&email=carol%40example.com",
    )
    .await;

    assert_eq!(res.status(), 303);
    assert!(set_cookie(&res, "bookmarks-flash").unwrap().contains("error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn not_found() {
    let server = server();

    for path in ["/user/nobody/", "/tag/nothing/", "/bookmark/7/", "/nowhere/"] {
        let res = get(&server, path, "").await;
        assert_eq!(res.status(), 404, "{}", path);
    }

    let res = get(&server, "/user/%3Cscript%3E/", "").await;
    assert_eq!(res.status(), 404);
    assert!(body(&res).contains("&lt;script&gt;"));
}

#[tokio::test(flavor = "multi_thread")]
async fn tags_search_and_autocomplete() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;

    save(
        &server,
        &cookie,
        "url=https%3A%2F%2Fwww.rust-lang.org%2F&title=Rust+Lang&tags=rust+rustacean",
    )
    .await;
    save(
        &server,
        &cookie,
        "url=https%3A%2F%2Fpython.org%2F&title=Python&tags=python",
    )
    .await;

    let res = get(&server, "/ajax/tag/autocomplete/?q=ru", "").await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(body(&res), "rust\nrustacean");

    let res = get(&server, "/tag/", "").await;
    assert!(body(&res).contains("class=\"tag-cloud-0\""));

    let res = get(&server, "/tag/python/", "").await;
    let html = body(&res);
    assert!(html.contains("Python"));
    assert!(!html.contains("Rust Lang"));

    let res = get(&server, "/search/?query=rust+lang", "").await;
    assert!(body(&res).contains("Rust Lang"));

    let res = request()
        .method("GET")
        .path("/search/?query=python")
        .header("x-requested-with", "XMLHttpRequest")
        .reply(&routes(&server))
        .await;
    let html = body(&res);
    assert!(html.contains("Python"));
    assert!(!html.contains("<html>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn feeds() {
    let server = server();
    register(&server, "alice").await;
    let cookie = login(&server, "alice").await;
    save(
        &server,
        &cookie,
        "url=http%3A%2F%2Fexample.com%2F&title=Example&tags=a+b",
    )
    .await;

    let res = get(&server, "/feeds/recent/", "").await;
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "application/rss+xml; charset=utf-8"
    );
    let xml = body(&res);
    assert!(xml.contains("<title>Example</title>"));
    assert!(xml.contains("Posted by alice. Tags: a, b"));

    let res = get(&server, "/feeds/user/alice/", "").await;
    assert_eq!(res.status(), 200);

    let res = get(&server, "/feeds/user/nobody/", "").await;
    assert_eq!(res.status(), 404);
}
