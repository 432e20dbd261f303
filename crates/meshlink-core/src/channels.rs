// ── Channel addressing ──
//
// Maps caller-supplied channel references (numeric or symbolic) onto the
// device's eight broadcast channels.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Aliases accepted in place of a numeric index, all mapping to channel 0.
/// Kept sorted so error messages list them deterministically.
const CHANNEL_ALIASES: [(&str, u8); 4] = [
    ("default", 0),
    ("general", 0),
    ("main", 0),
    ("public", 0),
];

/// Canonical identifier for a broadcast channel, always in `[0, 7]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    pub const MAX: u8 = 7;

    /// The main public channel.
    pub const GENERAL: ChannelIndex = ChannelIndex(0);

    pub fn new(index: u8) -> Option<Self> {
        (index <= Self::MAX).then_some(Self(index))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Friendly name: channel 0 is "General/Public", the rest "Channel n".
    pub fn display_name(self) -> String {
        if self.0 == 0 {
            "General/Public".into()
        } else {
            format!("Channel {}", self.0)
        }
    }

    /// Index-prefixed label, e.g. `"0 (General/Public)"`.
    pub fn label(self) -> String {
        format!("{} ({})", self.0, self.display_name())
    }
}

impl std::fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A caller-supplied channel reference, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Number(i64),
    Name(String),
}

impl From<i64> for ChannelRef {
    fn from(n: i64) -> Self {
        ChannelRef::Number(n)
    }
}

impl From<&str> for ChannelRef {
    fn from(s: &str) -> Self {
        ChannelRef::Name(s.into())
    }
}

/// Resolve an optional channel reference into a canonical index.
///
/// `None` means the caller intends direct-destination addressing and
/// resolves to `Ok(None)`. Numbers are range-checked against `[0, 7]`.
/// Strings are parsed as integers first; otherwise the trimmed,
/// lowercased value is looked up in the alias table.
pub fn resolve(input: Option<&ChannelRef>) -> Result<Option<ChannelIndex>, CoreError> {
    let Some(input) = input else {
        return Ok(None);
    };

    match input {
        ChannelRef::Number(n) => resolve_number(*n).map(Some),
        ChannelRef::Name(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return resolve_number(n).map(Some);
            }

            let normalized = trimmed.to_lowercase();
            CHANNEL_ALIASES
                .iter()
                .find(|(alias, _)| *alias == normalized)
                .and_then(|(_, index)| ChannelIndex::new(*index))
                .map(Some)
                .ok_or_else(|| CoreError::InvalidChannel {
                    value: s.clone(),
                    reason: format!("unknown channel name; use {} or 0-{}", accepted_aliases(), ChannelIndex::MAX),
                })
        }
    }
}

fn resolve_number(n: i64) -> Result<ChannelIndex, CoreError> {
    u8::try_from(n)
        .ok()
        .and_then(ChannelIndex::new)
        .ok_or_else(|| CoreError::InvalidChannel {
            value: n.to_string(),
            reason: format!("channel number must be between 0 and {}", ChannelIndex::MAX),
        })
}

fn accepted_aliases() -> String {
    CHANNEL_ALIASES
        .iter()
        .map(|(alias, _)| format!("'{alias}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
