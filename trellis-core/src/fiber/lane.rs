//! Priority Lanes
//!
//! A lane is an opaque priority token attached to every pending update.
//! Lanes are single bits so that a set of lanes (the work pending on a
//! fiber) is just their union. A lower bit means a higher priority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A priority lane, or a set of lanes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lane(u32);

impl Lane {
    /// No lane. Used outside of a render pass.
    pub const NO_LANE: Lane = Lane(0);

    /// Discrete, user-blocking updates.
    pub const SYNC: Lane = Lane(1 << 0);

    /// Continuous input such as pointer moves.
    pub const INPUT_CONTINUOUS: Lane = Lane(1 << 2);

    /// Updates with no particular urgency.
    pub const DEFAULT: Lane = Lane(1 << 4);

    /// Work that can wait until nothing else is pending.
    pub const IDLE: Lane = Lane(1 << 29);

    /// Build a lane set from its raw bit pattern.
    pub const fn from_bits(bits: u32) -> Self {
        Lane(bits)
    }

    /// Get the raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check whether this is the empty lane set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of two lane sets.
    pub fn merge(self, other: Lane) -> Lane {
        Lane(self.0 | other.0)
    }

    /// This set without the lanes of `other`.
    pub fn remove(self, other: Lane) -> Lane {
        Lane(self.0 & !other.0)
    }

    /// Check whether every lane of `other` is part of this set.
    pub fn contains(self, other: Lane) -> bool {
        self.0 & other.0 == other.0
    }

    /// The most urgent lane in this set.
    pub fn highest_priority(self) -> Lane {
        Lane(self.0 & self.0.wrapping_neg())
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Lane::NO_LANE => Some("none"),
            Lane::SYNC => Some("sync"),
            Lane::INPUT_CONTINUOUS => Some("input_continuous"),
            Lane::DEFAULT => Some("default"),
            Lane::IDLE => Some("idle"),
            _ => None,
        }
    }
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Lane({name})"),
            None => write!(f, "Lane({:#b})", self.0),
        }
    }
}

impl FromStr for Lane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Lane::NO_LANE),
            "sync" => Ok(Lane::SYNC),
            "input_continuous" => Ok(Lane::INPUT_CONTINUOUS),
            "default" => Ok(Lane::DEFAULT),
            "idle" => Ok(Lane::IDLE),
            other => Err(format!("unknown lane `{other}`")),
        }
    }
}

impl TryFrom<String> for Lane {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lane> for String {
    fn from(lane: Lane) -> Self {
        match lane.name() {
            Some(name) => name.to_string(),
            None => format!("{:#b}", lane.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_picks_lowest_bit() {
        let set = Lane::IDLE.merge(Lane::DEFAULT).merge(Lane::INPUT_CONTINUOUS);
        assert_eq!(set.highest_priority(), Lane::INPUT_CONTINUOUS);
        assert_eq!(Lane::NO_LANE.highest_priority(), Lane::NO_LANE);
    }

    #[test]
    fn merge_and_contains() {
        let set = Lane::SYNC.merge(Lane::DEFAULT);
        assert!(set.contains(Lane::SYNC));
        assert!(set.contains(Lane::DEFAULT));
        assert!(!set.contains(Lane::IDLE));
        assert!(!set.is_empty());
        assert_eq!(set.remove(Lane::SYNC), Lane::DEFAULT);
    }

    #[test]
    fn lanes_parse_by_name() {
        assert_eq!("sync".parse::<Lane>(), Ok(Lane::SYNC));
        assert_eq!("idle".parse::<Lane>(), Ok(Lane::IDLE));
        assert!("urgent".parse::<Lane>().is_err());
    }
}
