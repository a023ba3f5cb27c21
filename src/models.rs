use serde::Serialize;

pub type Time = crate::time_utils::Time;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id :            u32,
    pub name :          String,
    pub email :         String,
    #[serde(skip)]
    pub password :      String,
    pub token_version : u32,
    pub created :       Time,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id :  u32,
    pub url : String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id :   u32,
    pub name : String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id :        u32,
    pub name :      String,
    pub email :     String,
    pub code :      String,
    pub sender_id : u32,
}

/// A bookmark as listing pages show it.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id :       u32,
    pub title :    String,
    pub url :      String,
    pub username : String,
    pub tags :     Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedEntry {
    pub id :       u32,
    pub date :     Time,
    pub votes :    u32,
    pub bookmark : Entry,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id :       u32,
    pub username : String,
    pub text :     String,
    pub created :  Time,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name :  String,
    pub count : u32,
}

/// What a user submits to save or edit a bookmark.
#[derive(Debug, Clone, Default)]
pub struct SaveBookmark {
    pub url :   String,
    pub title : String,
    pub tags :  Vec<String>,
    pub share : bool,
}
