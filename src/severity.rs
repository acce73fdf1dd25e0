use serde::{Deserialize, Serialize};
use std::fmt;

/// Wheat rust severity classes, ordered from no disease to fully susceptible
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityLabel {
    Immune,
    R,
    #[serde(rename = "RMR")]
    Rmr,
    #[serde(rename = "MR")]
    Mr,
    #[serde(rename = "MRMS")]
    Mrms,
    #[serde(rename = "MS")]
    Ms,
    #[serde(rename = "MSS")]
    Mss,
    S,
}

impl SeverityLabel {
    /// All labels in index order
    pub const ALL: [SeverityLabel; 8] = [
        SeverityLabel::Immune,
        SeverityLabel::R,
        SeverityLabel::Rmr,
        SeverityLabel::Mr,
        SeverityLabel::Mrms,
        SeverityLabel::Ms,
        SeverityLabel::Mss,
        SeverityLabel::S,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeverityLabel::Immune => "Immune",
            SeverityLabel::R => "R",
            SeverityLabel::Rmr => "RMR",
            SeverityLabel::Mr => "MR",
            SeverityLabel::Mrms => "MRMS",
            SeverityLabel::Ms => "MS",
            SeverityLabel::Mss => "MSS",
            SeverityLabel::S => "S",
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_table_matches_order() {
        for (i, label) in SeverityLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(SeverityLabel::from_index(i), Some(*label));
        }
        assert_eq!(SeverityLabel::from_index(8), None);
    }

    #[test]
    fn serializes_as_display_name() {
        for label in SeverityLabel::ALL {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label));
        }
    }

    #[test]
    fn severity_increases_with_index() {
        assert!(SeverityLabel::Immune < SeverityLabel::Mrms);
        assert!(SeverityLabel::Mss < SeverityLabel::S);
    }
}
