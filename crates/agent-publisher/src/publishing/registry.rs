//! Closed registries of the languages and channels a listing can target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages listings can be published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    Mr,
    Hi,
    Gu,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 4] = [
        LanguageCode::En,
        LanguageCode::Mr,
        LanguageCode::Hi,
        LanguageCode::Gu,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Mr => "mr",
            LanguageCode::Hi => "hi",
            LanguageCode::Gu => "gu",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Mr => "Marathi",
            LanguageCode::Hi => "Hindi",
            LanguageCode::Gu => "Gujarati",
        }
    }

    pub fn native_name(self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Mr => "मराठी",
            LanguageCode::Hi => "हिन्दी",
            LanguageCode::Gu => "ગુજરાતી",
        }
    }

    pub fn descriptor(self) -> LanguageDescriptor {
        LanguageDescriptor {
            code: self,
            name: self.name(),
            native_name: self.native_name(),
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = UnknownCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        LanguageCode::ALL
            .into_iter()
            .find(|language| language.code() == normalized)
            .ok_or_else(|| UnknownCode {
                kind: "language",
                value: raw.to_string(),
            })
    }
}

/// Destination surfaces a listing can be exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    Website,
    Facebook,
    Instagram,
    Linkedin,
}

impl ChannelId {
    pub const ALL: [ChannelId; 4] = [
        ChannelId::Website,
        ChannelId::Facebook,
        ChannelId::Instagram,
        ChannelId::Linkedin,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ChannelId::Website => "website",
            ChannelId::Facebook => "facebook",
            ChannelId::Instagram => "instagram",
            ChannelId::Linkedin => "linkedin",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Website => "Agent Website",
            ChannelId::Facebook => "Facebook",
            ChannelId::Instagram => "Instagram",
            ChannelId::Linkedin => "LinkedIn",
        }
    }

    /// Instagram and LinkedIn are declared so requests can name them, but no
    /// integration exists behind them.
    pub fn is_implemented(self) -> bool {
        match self {
            ChannelId::Website | ChannelId::Facebook => true,
            ChannelId::Instagram | ChannelId::Linkedin => false,
        }
    }

    pub fn descriptor(self) -> ChannelDescriptor {
        ChannelDescriptor {
            code: self,
            name: self.name(),
            implemented: self.is_implemented(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ChannelId {
    type Err = UnknownCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        ChannelId::ALL
            .into_iter()
            .find(|channel| channel.code() == normalized)
            .ok_or_else(|| UnknownCode {
                kind: "channel",
                value: raw.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} code '{value}'")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageDescriptor {
    pub code: LanguageCode,
    pub name: &'static str,
    pub native_name: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelDescriptor {
    pub code: ChannelId,
    pub name: &'static str,
    pub implemented: bool,
}

pub fn supported_languages() -> Vec<LanguageDescriptor> {
    LanguageCode::ALL
        .into_iter()
        .map(LanguageCode::descriptor)
        .collect()
}

pub fn supported_channels() -> Vec<ChannelDescriptor> {
    ChannelId::ALL.into_iter().map(ChannelId::descriptor).collect()
}
