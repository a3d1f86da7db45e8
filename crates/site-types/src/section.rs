//! Section keys, the content tree and the tagged update operation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The live content tree: section name -> section value.
///
/// Keys are plain strings so blobs written by newer builds (with sections this
/// build does not know) survive a round trip.
pub type ContentTree = Map<String, Value>;

/// A named top-level slice of site content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    HomePage,
    About,
    Services,
    Team,
    Clients,
    Gallery,
    Testimonials,
    Contact,
    Faq,
    Theme,
    Seo,
}

impl SectionKey {
    pub const ALL: [SectionKey; 11] = [
        SectionKey::HomePage,
        SectionKey::About,
        SectionKey::Services,
        SectionKey::Team,
        SectionKey::Clients,
        SectionKey::Gallery,
        SectionKey::Testimonials,
        SectionKey::Contact,
        SectionKey::Faq,
        SectionKey::Theme,
        SectionKey::Seo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::HomePage => "homePage",
            SectionKey::About => "about",
            SectionKey::Services => "services",
            SectionKey::Team => "team",
            SectionKey::Clients => "clients",
            SectionKey::Gallery => "gallery",
            SectionKey::Testimonials => "testimonials",
            SectionKey::Contact => "contact",
            SectionKey::Faq => "faq",
            SectionKey::Theme => "theme",
            SectionKey::Seo => "seo",
        }
    }

    /// Sections shaped as ordered lists of records carrying an integer `id`.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            SectionKey::Services
                | SectionKey::Team
                | SectionKey::Clients
                | SectionKey::Gallery
                | SectionKey::Testimonials
                | SectionKey::Faq
        )
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown section: {0}")]
pub struct UnknownSection(pub String);

impl FromStr for SectionKey {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// How an update applies to a section.
///
/// `MergeObject` is a shallow, top-level merge (`{...old, ...partial}`): nested
/// objects passed in replace their counterparts wholesale. `ReplaceValue`
/// swaps the section value outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionUpdate {
    MergeObject(Map<String, Value>),
    ReplaceValue(Value),
}

impl SectionUpdate {
    /// Pick the operation by the value's shape: objects merge, everything else replaces.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => SectionUpdate::MergeObject(map),
            other => SectionUpdate::ReplaceValue(other),
        }
    }

    /// The value carried by the update, as published to subscribers.
    pub fn payload(&self) -> Value {
        match self {
            SectionUpdate::MergeObject(map) => Value::Object(map.clone()),
            SectionUpdate::ReplaceValue(v) => v.clone(),
        }
    }

    /// Apply to the current section value. Merging into a non-object starts from an empty object.
    pub fn apply(&self, current: Option<&Value>) -> Value {
        match self {
            SectionUpdate::MergeObject(partial) => {
                let mut merged = match current {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Map::new(),
                };
                for (k, v) in partial {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            }
            SectionUpdate::ReplaceValue(v) => v.clone(),
        }
    }
}

/// Change notification published after every successful content write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChange {
    pub section: SectionKey,
    pub data: Value,
}
