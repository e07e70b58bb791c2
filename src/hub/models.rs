use std::collections::HashSet;
use std::str::FromStr;

use podspace_common::roster;
use podspace_common::{BlockKind, BlockSummary, Member};
use serde::{Deserialize, Serialize};

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// A user as listed inside a pod or block, with avatar hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub initials: String,
    pub avatar_color: String,
}

impl From<&User> for MemberView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            initials: roster::initials(&user.name),
            avatar_color: roster::avatar_color(&user.id.to_string()).to_string(),
        }
    }
}

impl From<&MemberView> for Member {
    fn from(view: &MemberView) -> Self {
        Member {
            id: view.id,
            name: view.name.clone(),
            email: view.email.clone(),
        }
    }
}

// ── Pods ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: i64,
    pub name: String,
    pub tagline: String,
    pub logo_url: Option<String>,
    pub creator_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDetail {
    #[serde(flatten)]
    pub pod: Pod,
    pub members: Vec<MemberView>,
}

// ── Blocks ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: i64,
    pub pod_id: i64,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub label: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub creator_id: i64,
    pub created_at: String,
}

impl Block {
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            id: self.id,
            pod_id: self.pod_id,
            kind: self.kind,
            label: self.label.clone(),
            x: self.x,
            y: self.y,
            creator_id: self.creator_id,
        }
    }
}

/// Who a caller is relative to a block they can see.
#[derive(Debug, Clone)]
pub struct BlockAccess {
    pub block: Block,
    pub pod_creator_id: i64,
}

impl BlockAccess {
    /// Block creator or pod creator.
    pub fn can_manage(&self, user_id: i64) -> bool {
        self.block.creator_id == user_id || self.pod_creator_id == user_id
    }
}

/// Everyone allowed to see a block's contents: its creator, the pod creator
/// and the block members.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAudience {
    pub pod_id: i64,
    pub user_ids: HashSet<i64>,
}

impl BlockAudience {
    pub fn includes(&self, user_id: i64) -> bool {
        self.user_ids.contains(&user_id)
    }
}

// ── Chat ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub block_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub message: String,
    pub mentions: Vec<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadNotification {
    pub block_id: i64,
    pub block_name: String,
    pub pod_id: i64,
    pub pod_name: String,
    pub unread_count: u64,
}

// ── Block contents ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub block_id: i64,
    pub uploader_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: i64,
    pub block_id: i64,
    pub title: String,
    pub date: String,
    pub time: Option<String>,
    pub description: Option<String>,
    pub creator_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid goal status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: i64,
    pub block_id: i64,
    pub title: String,
    pub due_date: Option<String>,
    pub status: GoalStatus,
    pub creator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Raw row from the goals table, before status parsing.
pub(crate) struct GoalRow {
    pub id: i64,
    pub block_id: i64,
    pub title: String,
    pub due_date: Option<String>,
    pub status: String,
    pub creator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl GoalRow {
    pub fn into_goal(self) -> anyhow::Result<Goal> {
        let status = GoalStatus::from_str(&self.status).map_err(|e| anyhow::anyhow!(e))?;
        Ok(Goal {
            id: self.id,
            block_id: self.block_id,
            title: self.title,
            due_date: self.due_date,
            status,
            creator_id: self.creator_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ── Explore ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Startup,
    Agency,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Agency => "agency",
        }
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startup" => Ok(Self::Startup),
            "agency" => Ok(Self::Agency),
            _ => Err(format!("Invalid profile type: {}", s)),
        }
    }
}

/// Founder or team member on an explore profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub role: String,
}

/// Descriptive fields of an explore profile, as submitted by its owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileFields {
    pub name: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub location: Option<String>,
    pub funding_stage: Option<String>,
    pub date_started: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub founders: Vec<Person>,
    pub team_members: Vec<Person>,
    pub services: Vec<String>,
    pub clients: Vec<String>,
    pub years_of_experience: Option<i64>,
}

impl ProfileFields {
    /// Trim text fields and drop blank list entries.
    pub fn normalized(mut self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        fn clean_people(people: Vec<Person>) -> Vec<Person> {
            people
                .into_iter()
                .filter(|p| !p.name.trim().is_empty())
                .map(|p| Person {
                    name: p.name.trim().to_string(),
                    role: p.role.trim().to_string(),
                })
                .collect()
        }
        self.name = self.name.trim().to_string();
        self.tagline = clean(self.tagline);
        self.description = clean(self.description);
        self.logo_url = clean(self.logo_url);
        self.location = clean(self.location);
        self.funding_stage = clean(self.funding_stage);
        self.date_started = clean(self.date_started);
        self.website = clean(self.website);
        self.contact_email = clean(self.contact_email);
        self.contact_phone = clean(self.contact_phone);
        self.founders = clean_people(self.founders);
        self.team_members = clean_people(self.team_members);
        self.services = self
            .services
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.clients = self
            .clients
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExploreProfile {
    pub id: i64,
    pub owner_id: i64,
    pub pod_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: ProfileKind,
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub is_published: bool,
    pub is_featured: bool,
    pub view_count: i64,
    pub likes_count: i64,
    /// Present only when the request was authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    pub created_at: String,
}

// ── Stored files ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UploadKind {
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "pod-logo")]
    PodLogo,
    #[serde(rename = "explore-profile-logo")]
    ExploreProfileLogo,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::PodLogo => "pod-logo",
            Self::ExploreProfileLogo => "explore-profile-logo",
        }
    }
}

impl FromStr for UploadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(Self::Profile),
            "pod-logo" => Ok(Self::PodLogo),
            "explore-profile-logo" => Ok(Self::ExploreProfileLogo),
            _ => Err(format!("Invalid upload type: {}", s)),
        }
    }
}

/// An uploaded binary: an image behind `/api/upload/{id}` or a document.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: i64,
    pub kind: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub uploader_id: i64,
    pub created_at: String,
}
