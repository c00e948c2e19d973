use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Public URL returned by the image host.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub featured: bool,
}

impl BlogInput {
    /// Saving a post (new or edited) stamps it with the save time.
    pub fn into_post(self, now: DateTime<Utc>) -> BlogPost {
        BlogPost {
            title: self.title.trim().to_string(),
            content: self.content,
            image: self.image,
            featured: self.featured,
            created_at: Some(now),
        }
    }
}
