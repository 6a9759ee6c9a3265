// src/models/announcement.rs

use serde::{Deserialize, Serialize};

pub const STATUS_PUBLISHED: &str = "已發布";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    /// `已發布` means published; anything else is unpublished.
    pub status: String,
    pub is_pinned: bool,

    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub creator: String,
    pub last_modifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}

impl Announcement {
    pub fn is_published(&self) -> bool {
        self.status == STATUS_PUBLISHED
    }
}
