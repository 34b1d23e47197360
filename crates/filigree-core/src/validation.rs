//! Boundary-independent issue validation rules (spec §3 invariants, §6
//! boundary validation rules).
//!
//! Status/type validity against the template registry (INV-I1) is checked
//! by `filigree-templates`, not here — this module only knows about fields
//! that are self-contained on the `Issue` struct.

use crate::issue::Issue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be 500 characters or less (got {0})")]
    TitleTooLong(usize),

    #[error("priority must be between 0 and 4 (got {0})")]
    InvalidPriority(i32),

    #[error("closed issues must have closed_at timestamp")]
    ClosedWithoutTimestamp,

    #[error("non-closed issues cannot have closed_at timestamp")]
    NotClosedWithTimestamp,

    #[error("actor name is required and must be <= 128 characters with no control characters")]
    InvalidActor,
}

/// Validates an issue's self-contained fields (spec INV-I2, INV-I4).
/// `is_done` is the category lookup result for `issue.status`, supplied by
/// the caller since only the template registry knows categories.
pub fn validate_issue(issue: &Issue, is_done: bool) -> Result<(), ValidationError> {
    if issue.title.trim().is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if issue.title.len() > 500 {
        return Err(ValidationError::TitleTooLong(issue.title.len()));
    }
    if !(0..=4).contains(&issue.priority) {
        return Err(ValidationError::InvalidPriority(issue.priority));
    }
    if is_done && issue.closed_at.is_none() {
        return Err(ValidationError::ClosedWithoutTimestamp);
    }
    if !is_done && issue.closed_at.is_some() {
        return Err(ValidationError::NotClosedWithTimestamp);
    }
    Ok(())
}

/// Validates an `actor` string per the tool-call boundary rules (spec §6:
/// "actor name non-empty after whitespace trim, ≤128 characters, no Unicode
/// category-C characters").
pub fn validate_actor(actor: &str) -> Result<(), ValidationError> {
    let trimmed = actor.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 128 {
        return Err(ValidationError::InvalidActor);
    }
    if trimmed.chars().any(is_category_c) {
        return Err(ValidationError::InvalidActor);
    }
    Ok(())
}

/// Unicode category C: Cc (control, `char::is_control`) or Cf (format —
/// zero-width joiners, BOM, directional marks). `char` has no built-in Cf
/// test, so the common format-character ranges are matched directly.
fn is_category_c(c: char) -> bool {
    if c.is_control() {
        return true;
    }
    matches!(
        c as u32,
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x08E2
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0x110BD
            | 0x110CD
            | 0x13430..=0x13438
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueBuilder;

    #[test]
    fn valid_issue_passes() {
        let issue = IssueBuilder::new("Valid issue").priority(2).build();
        assert!(validate_issue(&issue, false).is_ok());
    }

    #[test]
    fn empty_title_fails() {
        let issue = IssueBuilder::new("").build();
        assert_eq!(
            validate_issue(&issue, false),
            Err(ValidationError::TitleRequired)
        );
    }

    #[test]
    fn closed_without_timestamp_fails() {
        let issue = IssueBuilder::new("Test").build();
        assert_eq!(
            validate_issue(&issue, true),
            Err(ValidationError::ClosedWithoutTimestamp)
        );
    }

    #[test]
    fn closed_with_timestamp_passes() {
        let issue = IssueBuilder::new("Test")
            .closed_at(chrono::Utc::now())
            .build();
        assert!(validate_issue(&issue, true).is_ok());
    }

    #[test]
    fn not_closed_with_timestamp_fails() {
        let issue = IssueBuilder::new("Test")
            .closed_at(chrono::Utc::now())
            .build();
        assert_eq!(
            validate_issue(&issue, false),
            Err(ValidationError::NotClosedWithTimestamp)
        );
    }

    #[test]
    fn actor_validation() {
        assert!(validate_actor("agent-1").is_ok());
        assert!(validate_actor("  ").is_err());
        assert!(validate_actor(&"x".repeat(129)).is_err());
        assert!(validate_actor("bad\u{0007}actor").is_err());
    }

    #[test]
    fn actor_with_format_char_fails() {
        // U+200B ZERO WIDTH SPACE is category Cf, not Cc.
        assert!(validate_actor("bad\u{200B}actor").is_err());
    }
}
