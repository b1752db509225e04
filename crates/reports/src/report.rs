use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult, OwnedResource, PrincipalId, ReportId};

pub const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The owning principal; `None` once that principal has been removed.
    pub author: Option<PrincipalId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    title: String,
    content: String,
}

impl NewReport {
    pub fn new(title: &str, content: &str) -> DomainResult<Self> {
        Ok(Self {
            title: validate_title(title)?,
            content: content.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl ReportPatch {
    pub fn replace(draft: NewReport) -> Self {
        Self {
            title: Some(draft.title),
            content: Some(draft.content),
        }
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

impl OwnedResource for Report {
    type Id = ReportId;
    type Draft = NewReport;
    type Patch = ReportPatch;

    fn id(&self) -> ReportId {
        self.id
    }

    fn owner(&self) -> Option<PrincipalId> {
        self.author
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: ReportId, owner: PrincipalId, draft: NewReport, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            created_at: now,
            author: Some(owner),
        }
    }

    fn apply_patch(&mut self, patch: ReportPatch) -> DomainResult<()> {
        if let Some(title) = patch.title.as_deref() {
            self.title = validate_title(title)?;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required_and_bounded() {
        assert!(NewReport::new("", "body").is_err());
        assert!(NewReport::new(&"t".repeat(256), "body").is_err());
        assert_eq!(NewReport::new(" Q3 ", "").unwrap().title(), "Q3");
    }

    #[test]
    fn author_is_the_owner() {
        let author = PrincipalId::new();
        let r = Report::from_draft(
            ReportId::new(),
            author,
            NewReport::new("Q3", "numbers").unwrap(),
            Utc::now(),
        );
        assert_eq!(r.owner(), Some(author));
        assert!(r.is_owned_by(author));
    }

    #[test]
    fn invalid_title_patch_is_rejected_before_content_changes() {
        let mut r = Report::from_draft(
            ReportId::new(),
            PrincipalId::new(),
            NewReport::new("Q3", "numbers").unwrap(),
            Utc::now(),
        );
        let before = r.clone();
        assert!(r
            .apply_patch(ReportPatch {
                title: Some(String::new()),
                content: Some("changed".into()),
            })
            .is_err());
        assert_eq!(r, before);
    }
}
