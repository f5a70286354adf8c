//! Matching port identification properties against board definitions.

use crate::core::{BoardCandidate, Properties};

/// A board as known to the catalog, flattened for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardDefinition {
    pub name: String,
    pub fqbn: String,
    pub properties: Properties,
}

impl BoardDefinition {
    pub fn new(name: impl Into<String>, fqbn: impl Into<String>, properties: Properties) -> Self {
        BoardDefinition {
            name: name.into(),
            fqbn: fqbn.into(),
            properties,
        }
    }

    /// Whether this board carries every identification property of a port.
    ///
    /// Boards list alternative signatures as `vid.0`/`pid.0`, `vid.1`/`pid.1`
    /// and so on; a plain `vid`/`pid` pair is tried first.
    pub fn matches(&self, attrs: &Properties) -> bool {
        if attrs.is_empty() {
            return false;
        }

        if self.check_suffix(attrs, "") == SuffixCheck::Match {
            return true;
        }

        for id in 0.. {
            match self.check_suffix(attrs, &format!(".{}", id)) {
                SuffixCheck::Match => return true,
                SuffixCheck::Mismatch => continue,
                SuffixCheck::Absent => return false,
            }
        }
        false
    }

    fn check_suffix(&self, attrs: &Properties, suffix: &str) -> SuffixCheck {
        let mut result = SuffixCheck::Match;
        for (key, expected) in attrs {
            match self.properties.get(&format!("{}{}", key, suffix)) {
                None => return SuffixCheck::Absent,
                Some(value) if !value.eq_ignore_ascii_case(expected) => {
                    result = SuffixCheck::Mismatch
                }
                Some(_) => {}
            }
        }
        result
    }

    pub fn candidate(&self) -> BoardCandidate {
        BoardCandidate::new(&self.name, &self.fqbn)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SuffixCheck {
    Match,
    Mismatch,
    Absent,
}

/// Every board matching `attrs`, in catalog order.
///
/// No match is an empty list; several matches are all returned.
pub fn identify<'a, I>(boards: I, attrs: &Properties) -> Vec<BoardCandidate>
where
    I: IntoIterator<Item = &'a BoardDefinition>,
{
    if attrs.is_empty() {
        return Vec::new();
    }

    boards
        .into_iter()
        .filter(|board| board.matches(attrs))
        .map(BoardDefinition::candidate)
        .collect()
}
