use serde::{Deserialize, Serialize};

/// `id == 0` on a record that has not been stored yet; the store assigns one.
pub const UNASSIGNED_ID: i64 = 0;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub date_of_birth: String,
    pub secondary_school_email: String,
    /// Stored and compared as plain text.
    pub password: String,
    pub date_created: i64,
    pub date_updated: i64,
}

impl User {
    pub fn new(
        full_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        secondary_school_email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: UNASSIGNED_ID,
            full_name: full_name.into(),
            date_of_birth: date_of_birth.into(),
            secondary_school_email: secondary_school_email.into(),
            password: password.into(),
            date_created: now,
            date_updated: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Display name of the author, not a reference to `users`.
    pub author: String,
    /// Epoch millis.
    pub timestamp: i64,
    pub likes: i64,
    pub dislikes: i64,
}

impl Post {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            title: title.into(),
            content: content.into(),
            author: author.into(),
            timestamp: now_millis(),
            likes: 0,
            dislikes: 0,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub timestamp: i64,
}

impl Comment {
    pub fn new(
        post_id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            post_id,
            title: title.into(),
            content: content.into(),
            author: author.into(),
            timestamp: now_millis(),
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

impl Item {
    pub fn new(name: impl Into<String>, price: f64, quantity: i64) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            price,
            quantity,
        }
    }
}

/// Primary key of a stored record.
pub trait Keyed {
    fn id(&self) -> i64;

    fn is_unassigned(&self) -> bool {
        self.id() == UNASSIGNED_ID
    }
}

impl Keyed for User {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Keyed for Post {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Keyed for Comment {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Keyed for Item {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_unassigned_with_matching_timestamps() {
        let user = User::new("Ada Lovelace", "1815-12-10", "ada@school.test", "pw");
        assert!(user.is_unassigned());
        assert_eq!(user.date_created, user.date_updated);
        assert!(user.date_created > 0);
    }

    #[test]
    fn new_post_starts_with_zero_votes() {
        let post = Post::new("Hello", "First post", "ada").at(42);
        assert_eq!((post.likes, post.dislikes), (0, 0));
        assert_eq!(post.timestamp, 42);
    }

    #[test]
    fn comment_keeps_its_post_reference() {
        let comment = Comment::new(7, "Re: Hello", "Nice", "bob");
        assert_eq!(comment.post_id, 7);
        assert!(comment.is_unassigned());
    }

    #[test]
    fn models_serialize_with_snake_case_fields() {
        let item = Item::new("widget", 2.5, 3);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "widget");
        assert_eq!(json["quantity"], 3);
    }
}
