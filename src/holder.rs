//! Permission holders and the repository that resolves their flags

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checks;
use crate::error::Result;
use crate::flag::Flag;

/// Discriminant of a holder, part of its bookkeeping identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HolderType {
    User,
    Role,
    DiscordUser,
    DiscordRole,
}

impl HolderType {
    pub fn as_str(self) -> &'static str {
        match self {
            HolderType::User => "user",
            HolderType::Role => "role",
            HolderType::DiscordUser => "discordUser",
            HolderType::DiscordRole => "discordRole",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(HolderType::User),
            "role" => Some(HolderType::Role),
            "discordUser" => Some(HolderType::DiscordUser),
            "discordRole" => Some(HolderType::DiscordRole),
            _ => None,
        }
    }

    /// Holder of this type with the given id
    pub fn holder(self, id: impl Into<String>) -> PermissionHolder {
        let id = id.into();
        match self {
            HolderType::User => PermissionHolder::User(id),
            HolderType::Role => PermissionHolder::Role(id),
            HolderType::DiscordUser => PermissionHolder::DiscordUser(id),
            HolderType::DiscordRole => PermissionHolder::DiscordRole(id),
        }
    }
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity that owns a permission set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum PermissionHolder {
    User(String),
    Role(String),
    DiscordUser(String),
    DiscordRole(String),
}

impl PermissionHolder {
    pub fn holder_type(&self) -> HolderType {
        match self {
            PermissionHolder::User(_) => HolderType::User,
            PermissionHolder::Role(_) => HolderType::Role,
            PermissionHolder::DiscordUser(_) => HolderType::DiscordUser,
            PermissionHolder::DiscordRole(_) => HolderType::DiscordRole,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PermissionHolder::User(id)
            | PermissionHolder::Role(id)
            | PermissionHolder::DiscordUser(id)
            | PermissionHolder::DiscordRole(id) => id,
        }
    }

    /// Check the id against the grammar of its holder type
    pub fn validate(&self) -> Result<()> {
        match self {
            PermissionHolder::User(id) | PermissionHolder::Role(id) => checks::object_id(id),
            PermissionHolder::DiscordUser(id) | PermissionHolder::DiscordRole(id) => checks::discord_id(id),
        }
    }

    pub fn key(&self) -> HolderKey {
        HolderKey { holder_type: self.holder_type(), id: self.id().to_string() }
    }
}

/// `(holderType, holderId)`: identity used for cooldown/limit bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderKey {
    pub holder_type: HolderType,
    pub id: String,
}

impl fmt::Display for HolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.holder_type, self.id)
    }
}

/// Source of a holder's stored flags
pub trait HolderRepository {
    /// Stored flags of `holder`; `PermError::NotFound` if the holder is unknown
    fn get_permissions(&self, holder: &PermissionHolder) -> Result<Vec<Flag>>;
}

impl<T: HolderRepository + ?Sized> HolderRepository for &T {
    fn get_permissions(&self, holder: &PermissionHolder) -> Result<Vec<Flag>> {
        (**self).get_permissions(holder)
    }
}

impl<T: HolderRepository + ?Sized> HolderRepository for Arc<T> {
    fn get_permissions(&self, holder: &PermissionHolder) -> Result<Vec<Flag>> {
        (**self).get_permissions(holder)
    }
}
