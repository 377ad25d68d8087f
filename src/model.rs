use crate::error::{NgajiError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const JUZ_MIN: i64 = 1;
pub const JUZ_MAX: i64 = 30;

/// Upper bound for a single credit and for the policy default.
pub const MAX_POINTS: i64 = 1_000;

pub fn validate_points(points: i64) -> Result<()> {
    if points < 0 {
        return Err(NgajiError::validation("points must not be negative"));
    }
    if points > MAX_POINTS {
        return Err(NgajiError::validation(format!(
            "points must not exceed {}",
            MAX_POINTS
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// New material ("hafalan").
    Memorization,
    /// Revision of already memorized material ("murojaah").
    Review,
}

impl SubmissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memorization => "memorization",
            Self::Review => "review",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memorization" | "hafalan" => Ok(Self::Memorization),
            "review" | "murojaah" => Ok(Self::Review),
            other => Err(NgajiError::validation(format!(
                "kind must be memorization or review, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(NgajiError::validation(format!(
                "unknown submission status {:?}",
                other
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accept,
    Reject,
}

impl Outcome {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "accept" | "accepted" | "diterima" => Ok(Self::Accept),
            "reject" | "rejected" | "ditolak" => Ok(Self::Reject),
            other => Err(NgajiError::validation(format!(
                "outcome must be accept or reject, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Parent => "parent",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" | "siswa" => Ok(Self::Student),
            "teacher" | "guru" => Ok(Self::Teacher),
            "parent" | "ortu" => Ok(Self::Parent),
            "admin" => Ok(Self::Admin),
            other => Err(NgajiError::validation(format!("unknown role {:?}", other))),
        }
    }

    pub fn can_review(self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

/// Which ledger bucket a credit lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointBucket {
    Memorization,
    Quiz,
}

impl PointBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memorization => "memorization",
            Self::Quiz => "quiz",
        }
    }
}

/// What was recited: surah name, juz and an optional verse range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub surah: String,
    pub juz: i64,
    pub verse_start: Option<i64>,
    pub verse_end: Option<i64>,
}

impl Reference {
    pub fn validate(&self) -> Result<()> {
        if self.surah.trim().is_empty() {
            return Err(NgajiError::validation("surah must not be empty"));
        }
        validate_juz(self.juz)?;
        for v in [self.verse_start, self.verse_end].into_iter().flatten() {
            if v < 1 {
                return Err(NgajiError::validation("verse numbers start at 1"));
            }
        }
        if let (Some(start), Some(end)) = (self.verse_start, self.verse_end) {
            if start > end {
                return Err(NgajiError::validation(
                    "verseStart must not be after verseEnd",
                ));
            }
        }
        Ok(())
    }
}

pub fn validate_juz(juz: i64) -> Result<()> {
    if (JUZ_MIN..=JUZ_MAX).contains(&juz) {
        Ok(())
    } else {
        Err(NgajiError::validation(format!(
            "juz must be between {} and {}, got {}",
            JUZ_MIN, JUZ_MAX, juz
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub student_id: String,
    pub group_id: String,
    pub kind: SubmissionKind,
    pub reference: Reference,
    pub media_uri: String,
    pub submitted_on: NaiveDate,
    pub status: SubmissionStatus,
    pub review_note: Option<String>,
    pub points_awarded: i64,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_points: i64,
    pub memorization_points: i64,
    pub quiz_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLedger {
    pub student_id: String,
    #[serde(flatten)]
    pub totals: Totals,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub student_id: String,
    pub juz: i64,
    pub issuer_id: String,
    pub note: String,
    pub issued_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub rank: usize,
    pub student_id: String,
    pub name: String,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub group_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub teacher_id: String,
    pub code: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(juz: i64, start: Option<i64>, end: Option<i64>) -> Reference {
        Reference {
            surah: "An-Naba".to_string(),
            juz,
            verse_start: start,
            verse_end: end,
        }
    }

    #[test]
    fn kind_accepts_local_aliases() {
        assert_eq!(
            SubmissionKind::parse("hafalan").unwrap(),
            SubmissionKind::Memorization
        );
        assert_eq!(SubmissionKind::parse(" Murojaah ").unwrap(), SubmissionKind::Review);
        assert!(matches!(
            SubmissionKind::parse("tilawah"),
            Err(NgajiError::Validation(_))
        ));
    }

    #[test]
    fn reference_bounds() {
        assert!(reference(1, None, None).validate().is_ok());
        assert!(reference(30, Some(1), Some(40)).validate().is_ok());
        assert!(reference(0, None, None).validate().is_err());
        assert!(reference(31, None, None).validate().is_err());
        assert!(reference(30, Some(5), Some(3)).validate().is_err());
        assert!(reference(30, Some(0), None).validate().is_err());

        let mut blank = reference(5, None, None);
        blank.surah = "  ".into();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn only_teachers_and_admins_review() {
        assert!(Role::Teacher.can_review());
        assert!(Role::Admin.can_review());
        assert!(!Role::Student.can_review());
        assert!(!Role::Parent.can_review());
        assert_eq!(Role::parse("guru").unwrap(), Role::Teacher);
        assert_eq!(Role::parse("ortu").unwrap(), Role::Parent);
    }
}
