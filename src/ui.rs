use handlebars::{handlebars_helper, Handlebars};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::api::Session;
use crate::cloud::CloudTag;
use crate::forms::{BookmarkForm, CommentForm, FormErrors, InviteForm, RegistrationForm};
use crate::mail::Mail;
use crate::paginate::Page;
use crate::{models, Result};

pub const SITE_NAME : &str = "Bookmarks";

handlebars_helper!(urlencode: |s : str| utf8_percent_encode(s, NON_ALPHANUMERIC).to_string());

pub struct Renderer {
    html : Handlebars<'static>,
    text : Handlebars<'static>,
}

/// Release builds carry the templates in the binary, debug builds read
/// them from `ui/` on every render so they can be edited live.
macro_rules! register {
    ($t:expr, $(($name:expr, $path:expr))*) => {
        $(
            #[cfg(not(debug_assertions))]
            $t.register_template_string(
                $name,
                include_str!(concat!("../ui/", $path)),
            )?;

            #[cfg(debug_assertions)]
            $t.register_template_file(
                $name,
                concat!(env!("CARGO_MANIFEST_DIR"), "/ui/", $path),
            )?;
        )*
    };
}

#[derive(Serialize)]
struct Head<'a> {
    title :    &'a str,
    site :     &'static str,
    username : Option<&'a str>,
    flash :    Option<&'a str>,
}

impl<'a> Head<'a> {
    fn new(title : &'a str, session : &'a Session) -> Self {
        Head {
            title,
            site : SITE_NAME,
            username : session.user.as_ref().map(|u| u.name.as_str()),
            flash : session.flash.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct List<'a> {
    bookmarks : &'a [models::Entry],
    show_edit : bool,
    show_tags : bool,
    show_user : bool,
}

pub struct Channel {
    pub title :       String,
    pub link :        String,
    pub description : String,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut html = Handlebars::new();
        html.set_strict_mode(true);
        html.set_dev_mode(cfg!(debug_assertions));
        html.register_helper("urlencode", Box::new(urlencode));

        register! { html,
            ("header", "header.html")
            ("footer", "footer.html")
            ("bookmark-list", "bookmark-list.html")
            ("shared-list", "shared-list.html")
            ("form-errors", "form-errors.html")
            ("main", "main.html")
            ("popular", "popular.html")
            ("user", "user.html")
            ("tag", "tag.html")
            ("tag-cloud", "tag-cloud.html")
            ("search", "search.html")
            ("bookmark", "bookmark.html")
            ("save", "save.html")
            ("save-form", "save-form.html")
            ("friends", "friends.html")
            ("friend-invite", "friend-invite.html")
            ("login", "login.html")
            ("register", "register.html")
            ("register-success", "register-success.html")
            ("feed", "feed.xml")
        }

        let mut text = Handlebars::new();
        text.set_strict_mode(true);
        text.register_escape_fn(handlebars::no_escape);

        register! { text,
            ("invitation-mail", "invitation-mail.txt")
        }

        Ok(Self { html, text })
    }

    fn render<T : Serialize>(&self, name : &str, ctx : &T) -> Result<String> {
        Ok(self.html.render(name, ctx)?)
    }

    pub fn main_page(
        &self,
        session : &Session,
        shared : &[models::SharedEntry],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :             Head<'a>,
            shared_bookmarks : &'a [models::SharedEntry],
        }

        self.render("main", &Ctx {
            head : Head::new("Welcome", session),
            shared_bookmarks : shared,
        })
    }

    pub fn popular_page(
        &self,
        session : &Session,
        shared : &[models::SharedEntry],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :             Head<'a>,
            shared_bookmarks : &'a [models::SharedEntry],
        }

        self.render("popular", &Ctx {
            head : Head::new("Popular Bookmarks", session),
            shared_bookmarks : shared,
        })
    }

    pub fn user_page(
        &self,
        session : &Session,
        username : &str,
        page : &Page<models::Entry>,
        is_friend : bool,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :           Head<'a>,
            username :       &'a str,
            #[serde(flatten)]
            list :           List<'a>,
            page :           &'a Page<models::Entry>,
            show_paginator : bool,
            is_friend :      bool,
            can_befriend :   bool,
        }

        let own = session.user.as_ref().map(|u| u.name.as_str()) == Some(username);
        let title = format!("Bookmarks for {}", username);

        self.render("user", &Ctx {
            head : Head::new(&title, session),
            username,
            list : List {
                bookmarks : &page.items,
                show_edit : own,
                show_tags : true,
                show_user : false,
            },
            page,
            show_paginator : page.num_pages > 1,
            is_friend,
            can_befriend : session.user.is_some() && !own && !is_friend,
        })
    }

    pub fn tag_page(
        &self,
        session : &Session,
        tag_name : &str,
        bookmarks : &[models::Entry],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :     Head<'a>,
            tag_name : &'a str,
            #[serde(flatten)]
            list :     List<'a>,
        }

        let title = format!("Bookmarks for tag: {}", tag_name);

        self.render("tag", &Ctx {
            head : Head::new(&title, session),
            tag_name,
            list : List {
                bookmarks,
                show_edit : false,
                show_tags : true,
                show_user : true,
            },
        })
    }

    pub fn tag_cloud_page(
        &self,
        session : &Session,
        tags : &[CloudTag],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head : Head<'a>,
            tags : &'a [CloudTag],
        }

        self.render("tag-cloud", &Ctx {
            head : Head::new("Tag Cloud", session),
            tags,
        })
    }

    pub fn search_page(
        &self,
        session : &Session,
        query : &str,
        bookmarks : &[models::Entry],
        show_results : bool,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :         Head<'a>,
            query :        &'a str,
            show_results : bool,
            #[serde(flatten)]
            list :         List<'a>,
        }

        self.render("search", &Ctx {
            head : Head::new("Search Bookmarks", session),
            query,
            show_results,
            list : List {
                bookmarks,
                show_edit : false,
                show_tags : true,
                show_user : true,
            },
        })
    }

    /// The bare list, for requests made from page scripts.
    pub fn bookmark_list(
        &self,
        bookmarks : &[models::Entry],
        show_edit : bool,
    ) -> Result<String> {
        self.render("bookmark-list", &List {
            bookmarks,
            show_edit,
            show_tags : true,
            show_user : !show_edit,
        })
    }

    pub fn bookmark_page(
        &self,
        session : &Session,
        shared : &models::SharedEntry,
        comments : &[models::Comment],
        form : &CommentForm,
        errors : &FormErrors,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :            Head<'a>,
            shared_bookmark : &'a models::SharedEntry,
            comments :        &'a [models::Comment],
            can_comment :     bool,
            form :            &'a CommentForm,
            errors :          &'a FormErrors,
        }

        self.render("bookmark", &Ctx {
            head : Head::new(&shared.bookmark.title, session),
            shared_bookmark : shared,
            comments,
            can_comment : session.user.is_some(),
            form,
            errors,
        })
    }

    pub fn save_page(
        &self,
        session : &Session,
        form : &BookmarkForm,
        errors : &FormErrors,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :   Head<'a>,
            form :   &'a BookmarkForm,
            share :  bool,
            errors : &'a FormErrors,
        }

        self.render("save", &Ctx {
            head : Head::new("Save Bookmark", session),
            form,
            share : form.share.is_some(),
            errors,
        })
    }

    /// Just the form, for the in-place editor.
    pub fn save_form(
        &self,
        form : &BookmarkForm,
        errors : &FormErrors,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            form :   &'a BookmarkForm,
            share :  bool,
            errors : &'a FormErrors,
        }

        self.render("save-form", &Ctx {
            form,
            share : form.share.is_some(),
            errors,
        })
    }

    pub fn friends_page(
        &self,
        session : &Session,
        username : &str,
        friends : &[String],
        bookmarks : &[models::Entry],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :     Head<'a>,
            username : &'a str,
            friends :  &'a [String],
            #[serde(flatten)]
            list :     List<'a>,
        }

        let title = format!("Friends for {}", username);

        self.render("friends", &Ctx {
            head : Head::new(&title, session),
            username,
            friends,
            list : List {
                bookmarks,
                show_edit : false,
                show_tags : true,
                show_user : true,
            },
        })
    }

    pub fn friend_invite_page(
        &self,
        session : &Session,
        form : &InviteForm,
        errors : &FormErrors,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :   Head<'a>,
            form :   &'a InviteForm,
            errors : &'a FormErrors,
        }

        self.render("friend-invite", &Ctx {
            head : Head::new("Invite A Friend", session),
            form,
            errors,
        })
    }

    pub fn login_page(
        &self,
        session : &Session,
        username : &str,
        next : &str,
        failed : bool,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :     Head<'a>,
            username : &'a str,
            next :     &'a str,
            failed :   bool,
        }

        self.render("login", &Ctx {
            head : Head::new("User Login", session),
            username,
            next,
            failed,
        })
    }

    pub fn register_page(
        &self,
        session : &Session,
        form : &RegistrationForm,
        errors : &FormErrors,
        invitation : Option<&models::Invitation>,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head :       Head<'a>,
            form :       &'a RegistrationForm,
            errors :     &'a FormErrors,
            invitation : Option<&'a models::Invitation>,
        }

        self.render("register", &Ctx {
            head : Head::new("User Registration", session),
            form,
            errors,
            invitation,
        })
    }

    pub fn register_success_page(&self, session : &Session) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            head : Head<'a>,
        }

        self.render("register-success", &Ctx {
            head : Head::new("Registration Successful", session),
        })
    }

    pub fn feed(
        &self,
        channel : &Channel,
        site_url : &str,
        bookmarks : &[models::Entry],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Item {
            title :       String,
            link :        String,
            description : String,
            guid :        String,
        }

        #[derive(Serialize)]
        struct Ctx<'a> {
            title :       &'a str,
            link :        &'a str,
            description : &'a str,
            built :       String,
            items :       Vec<Item>,
        }

        let items = bookmarks
            .iter()
            .map(|b| {
                let mut description = format!("Posted by {}", b.username);
                if !b.tags.is_empty() {
                    description.push_str(". Tags: ");
                    description.push_str(&b.tags.join(", "));
                }

                Item {
                    title : b.title.clone(),
                    link : b.url.clone(),
                    description,
                    guid : format!("{}/bookmarks/{}", site_url, b.id),
                }
            })
            .collect();

        self.render("feed", &Ctx {
            title : &channel.title,
            link : &channel.link,
            description : &channel.description,
            built : models::Time::now().rss(),
            items,
        })
    }

    pub fn invitation_mail(
        &self,
        invitation : &models::Invitation,
        sender : &str,
        link : &str,
    ) -> Result<Mail> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            name :   &'a str,
            sender : &'a str,
            site :   &'static str,
            link :   &'a str,
        }

        let body = self.text.render("invitation-mail", &Ctx {
            name : &invitation.name,
            sender,
            site : SITE_NAME,
            link,
        })?;

        Ok(Mail {
            to : invitation.email.clone(),
            subject : format!("Invitation to join {}", SITE_NAME),
            body,
        })
    }
}
