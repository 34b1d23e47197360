//! File, finding, and association entities (spec §3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tracked repository file (spec §3 "File record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    pub language: Option<String>,
    pub file_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Scan-finding severity (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Weight used by `get_file_hotspots` (spec §4.6: "critical×4 + high×3
    /// + medium×2 + low"). `info` does not contribute to the hotspot score.
    pub fn hotspot_weight(&self) -> u32 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            other => return Err(format!("unknown severity: {other}")),
        })
    }
}

/// Scan-finding lifecycle status (spec §3).
///
/// INV-F2: status `fixed` or `false_positive` means the finding is
/// terminal; other statuses are "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Acknowledged,
    UnseenInLatest,
    Fixed,
    FalsePositive,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Acknowledged => "acknowledged",
            FindingStatus::UnseenInLatest => "unseen_in_latest",
            FindingStatus::Fixed => "fixed",
            FindingStatus::FalsePositive => "false_positive",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FindingStatus::Fixed | FindingStatus::FalsePositive)
    }
}

impl std::str::FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "open" => FindingStatus::Open,
            "acknowledged" => FindingStatus::Acknowledged,
            "unseen_in_latest" => FindingStatus::UnseenInLatest,
            "fixed" => FindingStatus::Fixed,
            "false_positive" => FindingStatus::FalsePositive,
            other => return Err(format!("unknown finding status: {other}")),
        })
    }
}

/// A discovered issue in a file (spec §3 "Scan finding").
///
/// INV-F1: at most one finding per `(file_id, scan_source, rule_id,
/// line_start)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub file_id: String,
    pub scan_source: String,
    pub rule_id: String,
    pub severity: Severity,
    pub status: FindingStatus,
    pub message: String,
    pub suggestion: Option<String>,
    pub line_start: Option<i32>,
    pub line_end: Option<i32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: i32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// The scan run that last touched this finding. Used by
    /// `clean_stale_findings` to detect absence across a scan cycle; not a
    /// product-spec field name but required to implement §4.6/§13's
    /// resolved grace-period rule without a wall-clock timer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_run_id: Option<String>,
    /// Set when a finding first goes `unseen_in_latest`, so a second
    /// consecutive absence (not merely "still absent later") triggers the
    /// transition to `fixed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unseen_since_run_id: Option<String>,
}

/// Association kind between a file and an issue (spec §3 "File
/// association").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssocType {
    BugIn,
    TaskFor,
    ScanFinding,
    MentionedIn,
}

impl AssocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssocType::BugIn => "bug_in",
            AssocType::TaskFor => "task_for",
            AssocType::ScanFinding => "scan_finding",
            AssocType::MentionedIn => "mentioned_in",
        }
    }
}

impl std::str::FromStr for AssocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bug_in" => AssocType::BugIn,
            "task_for" => AssocType::TaskFor,
            "scan_finding" => AssocType::ScanFinding,
            "mentioned_in" => AssocType::MentionedIn,
            other => return Err(format!("unknown association type: {other}")),
        })
    }
}

/// A link between a file and an issue (spec §3 "File association"). Insert
/// is idempotent on the full tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAssociation {
    pub id: i64,
    pub file_id: String,
    pub issue_id: String,
    pub assoc_type: AssocType,
    pub created_at: DateTime<Utc>,
}

/// A lightweight timeline entry for a metadata change on a file (spec §3
/// "File event").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    pub id: i64,
    pub file_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotspot_weights_match_spec_formula() {
        assert_eq!(Severity::Critical.hotspot_weight(), 4);
        assert_eq!(Severity::High.hotspot_weight(), 3);
        assert_eq!(Severity::Medium.hotspot_weight(), 2);
        assert_eq!(Severity::Low.hotspot_weight(), 1);
    }

    #[test]
    fn terminal_statuses() {
        assert!(FindingStatus::Fixed.is_terminal());
        assert!(FindingStatus::FalsePositive.is_terminal());
        assert!(!FindingStatus::Acknowledged.is_terminal());
        assert!(!FindingStatus::Open.is_terminal());
    }

    #[test]
    fn severity_round_trips() {
        for s in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ] {
            let parsed: Severity = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
