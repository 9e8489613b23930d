use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Application lifecycle of a resume, as tracked by its owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumeStatus {
    #[default]
    #[serde(rename = "not applied")]
    NotApplied,
    #[serde(rename = "applied")]
    Applied,
    #[serde(rename = "interviewed")]
    Interviewed,
    #[serde(rename = "got an offer")]
    GotAnOffer,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::NotApplied => "not applied",
            ResumeStatus::Applied => "applied",
            ResumeStatus::Interviewed => "interviewed",
            ResumeStatus::GotAnOffer => "got an offer",
        }
    }
}

impl fmt::Display for ResumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resume status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ResumeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not applied" => Ok(ResumeStatus::NotApplied),
            "applied" => Ok(ResumeStatus::Applied),
            "interviewed" => Ok(ResumeStatus::Interviewed),
            "got an offer" => Ok(ResumeStatus::GotAnOffer),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Text sections the ingest pipeline derives from the resume body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeChunks {
    pub work_experience: Vec<String>,
    pub skills: Vec<String>,
    pub summary: String,
}

/// One uploaded resume file and everything known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_url: Option<String>,
    pub owner_id: Option<String>,
    pub category_id: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub status: ResumeStatus,
    pub notes: Option<String>,
    pub chunks: Option<ResumeChunks>,
    pub tags: Vec<String>,
    pub suggestions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `resumes` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_url: Option<String>,
    pub owner_id: Option<String>,
    pub category_id: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub chunks: Option<Json<ResumeChunks>>,
    pub tags: Vec<String>,
    pub suggestions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ResumeRow> for ResumeRecord {
    type Error = UnknownStatus;

    fn try_from(row: ResumeRow) -> Result<Self, Self::Error> {
        Ok(ResumeRecord {
            status: row.status.parse()?,
            id: row.id,
            file_name: row.file_name,
            file_path: row.file_path,
            file_url: row.file_url,
            owner_id: row.owner_id,
            category_id: row.category_id,
            company: row.company,
            job_title: row.job_title,
            notes: row.notes,
            chunks: row.chunks.map(|Json(c)| c),
            tags: row.tags,
            suggestions: row.suggestions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResumeStatus::GotAnOffer).unwrap(),
            "\"got an offer\""
        );
        let parsed: ResumeStatus = serde_json::from_str("\"not applied\"").unwrap();
        assert_eq!(parsed, ResumeStatus::NotApplied);
    }

    #[test]
    fn test_status_from_str_rejects_unknown() {
        assert_eq!("interviewed".parse(), Ok(ResumeStatus::Interviewed));
        assert!("hired".parse::<ResumeStatus>().is_err());
    }

    #[test]
    fn test_chunks_serialize_camel_case() {
        let chunks = ResumeChunks {
            work_experience: vec!["Built X".into()],
            skills: vec!["Go".into()],
            summary: "Engineer".into(),
        };
        let value = serde_json::to_value(&chunks).unwrap();
        assert_eq!(value["workExperience"][0], "Built X");
        assert_eq!(value["summary"], "Engineer");
    }
}
