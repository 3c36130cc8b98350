use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sponsor code stored on the first registered participant.
pub const ROOT_SPONSOR: &str = "ROOT";

/// Public identifier of a participant, e.g. `M000042`.
///
/// Assigned once at registration from the number of participants already in the
/// store and never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberCode(pub String);

impl MemberCode {
    /// Builds the fixed-width code for the `sequence`-th registrant (1-based).
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("M{:06}", sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Branch designation used for placement, counting and downline reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(format!("unknown side '{}', expected 'left' or 'right'", other)),
        }
    }
}

/// One registrant in the binary tree.
///
/// The tree is defined by the forward links `left_child`/`right_child`;
/// `parent_id` is the single upward link used by count propagation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub member_code: MemberCode,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub credential_hash: String,

    /// Resolved tree parent's code, or `ROOT` for the first participant.
    pub sponsor_code: String,
    /// Sponsor code supplied at registration (who invited this participant).
    pub referred_by: Option<MemberCode>,
    /// True tree parent. `None` only for the root.
    pub parent_id: Option<MemberCode>,

    pub left_child: Option<MemberCode>,
    pub right_child: Option<MemberCode>,
    /// Number of nodes in the left subtree (all depths).
    pub left_count: u64,
    /// Number of nodes in the right subtree (all depths).
    pub right_count: u64,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Participant {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn child(&self, side: Side) -> Option<&MemberCode> {
        match side {
            Side::Left => self.left_child.as_ref(),
            Side::Right => self.right_child.as_ref(),
        }
    }

    pub fn child_mut(&mut self, side: Side) -> &mut Option<MemberCode> {
        match side {
            Side::Left => &mut self.left_child,
            Side::Right => &mut self.right_child,
        }
    }

    /// Which of this node's slots holds `child`, if any.
    pub fn side_of(&self, child: &MemberCode) -> Option<Side> {
        if self.left_child.as_ref() == Some(child) {
            Some(Side::Left)
        } else if self.right_child.as_ref() == Some(child) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn count(&self, side: Side) -> u64 {
        match side {
            Side::Left => self.left_count,
            Side::Right => self.right_count,
        }
    }

    pub fn increment_count(&mut self, side: Side) {
        match side {
            Side::Left => self.left_count += 1,
            Side::Right => self.right_count += 1,
        }
    }

    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            name: self.name.clone(),
            member_code: self.member_code.clone(),
            left_count: self.left_count,
            right_count: self.right_count,
        }
    }
}

/// Row of a downline report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub name: String,
    pub member_code: MemberCode,
    pub left_count: u64,
    pub right_count: u64,
}

/// Full descendant set of one participant, split by the initial side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Downline {
    pub left_members: Vec<ParticipantSummary>,
    pub right_members: Vec<ParticipantSummary>,
}

/// Current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
