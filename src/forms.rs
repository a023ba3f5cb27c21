//! Form bodies as they arrive from the browser, and their validation.
//!
//! Every form deserializes with all fields defaulted so a half-filled post
//! still reaches validation and can be shown again with its errors.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::SaveBookmark;

pub const MAX_TAG : usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field :   &'static str,
    pub message : String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn add(&mut self, field : &'static str, message : impl Into<String>) {
        self.0.push(FieldError {
            field,
            message : message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field : &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors : ValidationErrors) -> Self {
        let mut fields : Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let mut out = FormErrors::default();
        for (field, errs) in fields {
            for err in errs.iter() {
                let message = match &err.message {
                    Some(m) => m.to_string(),
                    None if err.code == "must_match" => "Passwords do not match.".into(),
                    None => format!("Invalid value ({}).", err.code),
                };
                out.add(field, message);
            }
        }

        out
    }
}

fn field_error(code : &'static str, message : &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn username_chars(name : &str) -> Result<(), ValidationError> {
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(field_error(
            "username_chars",
            "Username can only contain letters, digits and the underscore.",
        ))
    }
}

fn link_url(url : &str) -> Result<(), ValidationError> {
    normalize_url(url)
        .map(|_| ())
        .ok_or_else(|| field_error("link_url", "Enter a valid URL."))
}

fn tag_lengths(tags : &str) -> Result<(), ValidationError> {
    if tags.split_whitespace().any(|t| t.chars().count() > MAX_TAG) {
        Err(field_error("tag_length", "Tags can be at most 64 characters."))
    } else {
        Ok(())
    }
}

/// Parses and normalizes a bookmark URL the way it is stored.
pub fn normalize_url(s : &str) -> Option<String> {
    let u = url::Url::parse(s.trim()).ok()?;

    match u.scheme() {
        "http" | "https" | "ftp" | "ftps" if u.has_host() => {
            Some(u.as_str().to_string())
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct RegistrationForm {
    #[validate(
        length(min = 1, max = 30, message = "Username is required, up to 30 characters."),
        custom = "username_chars"
    )]
    pub username :  String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email :     String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "Password is required."))]
    pub password1 : String,
    #[serde(skip_serializing)]
    #[validate(must_match = "password1")]
    pub password2 : String,
}

#[derive(Debug)]
pub struct NewUser {
    pub username : String,
    pub email :    String,
    pub password : String,
}

impl RegistrationForm {
    pub fn clean(&self) -> Result<NewUser, FormErrors> {
        let form = RegistrationForm {
            username : self.username.trim().to_string(),
            email : self.email.trim().to_string(),
            ..self.clone()
        };
        form.validate()?;

        Ok(NewUser {
            username : form.username,
            email :    form.email,
            password : form.password1,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct BookmarkForm {
    #[validate(custom = "link_url")]
    pub url :   String,
    #[validate(length(min = 1, max = 200, message = "Title is required, up to 200 characters."))]
    pub title : String,
    #[validate(custom = "tag_lengths")]
    pub tags :  String,
    /// Checkbox: present (usually as "on") when ticked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share : Option<String>,
}

impl BookmarkForm {
    pub fn clean(&self) -> Result<SaveBookmark, FormErrors> {
        let form = BookmarkForm {
            title : self.title.trim().to_string(),
            ..self.clone()
        };
        form.validate()?;

        let mut tags : Vec<String> = Vec::new();
        for tag in form.tags.split_whitespace() {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Ok(SaveBookmark {
            url : normalize_url(&form.url).unwrap_or_default(),
            title : form.title,
            tags,
            share : form.share.is_some(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub query : Option<String>,
}

impl SearchForm {
    pub fn keywords(&self) -> Vec<String> {
        self.query
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct InviteForm {
    #[validate(length(min = 1, message = "Friend's name is required."))]
    pub name :  String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email : String,
}

#[derive(Debug)]
pub struct NewInvitation {
    pub name :  String,
    pub email : String,
}

impl InviteForm {
    pub fn clean(&self) -> Result<NewInvitation, FormErrors> {
        let form = InviteForm {
            name :  self.name.trim().to_string(),
            email : self.email.trim().to_string(),
        };
        form.validate()?;

        Ok(NewInvitation {
            name :  form.name,
            email : form.email,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(min = 1, max = 3000, message = "Comment is required, up to 3000 characters."))]
    pub comment : String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let form = CommentForm {
            comment : self.comment.trim().to_string(),
        };
        form.validate()?;

        Ok(form.comment)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username : String,
    pub password : String,
    pub next :     Option<String>,
}

/// Only same-site paths are followed after login, and only ones that fit
/// in a `Location` header.
pub fn safe_next(next : Option<&str>) -> &str {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.chars().any(char::is_control) =>
        {
            n
        },
        _ => "/",
    }
}
