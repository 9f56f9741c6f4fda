//! Like types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceId;

/// A user's like on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: ResourceId,
    pub post_id: ResourceId,
    pub user_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
