//! News posts shown on the public site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{Validate, not_blank};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub post_id:    Uuid,
  pub title:      String,
  pub body:       String,
  pub category:   String,
  /// Not kept in sync with the media library; may dangle after a delete.
  pub image_url:  Option<String>,
  pub published:  bool,
  pub author_id:  Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::SiteStore::create_post`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewPost {
  #[validate(
    custom(function = "not_blank"),
    length(max = 200, message = "must be at most 200 characters")
  )]
  pub title:     String,
  #[validate(custom(function = "not_blank"))]
  pub body:      String,
  #[serde(default = "default_category")]
  #[validate(custom(function = "not_blank"))]
  pub category:  String,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub published: bool,
}

fn default_category() -> String { "news".to_owned() }

/// A partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PostPatch {
  #[validate(
    custom(function = "not_blank"),
    length(max = 200, message = "must be at most 200 characters")
  )]
  pub title:     Option<String>,
  #[validate(custom(function = "not_blank"))]
  pub body:      Option<String>,
  #[validate(custom(function = "not_blank"))]
  pub category:  Option<String>,
  pub image_url: Option<String>,
  pub published: Option<bool>,
}

impl PostPatch {
  pub fn apply(self, post: &mut Post) {
    if let Some(title) = self.title {
      post.title = title.trim().to_owned();
    }
    if let Some(body) = self.body {
      post.body = body;
    }
    if let Some(category) = self.category {
      post.category = category.trim().to_owned();
    }
    if let Some(image_url) = self.image_url {
      post.image_url = Some(image_url).filter(|u| !u.is_empty());
    }
    if let Some(published) = self.published {
      post.published = published;
    }
  }
}
