use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::letters::TemplateKind;

/// Identifier wrapper for prospective companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub u64);

/// Identifier wrapper for scraped vacancies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VacancyId(pub u64);

/// Identifier wrapper for partnership letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LetterId(pub u64);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LetterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outreach lifecycle of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    New,
    Approved,
    Rejected,
    Sent,
    /// Reserved for reply tracking; nothing transitions here yet.
    Responded,
}

impl CompanyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
            Self::Responded => "responded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "sent" => Some(Self::Sent),
            "responded" => Some(Self::Responded),
            _ => None,
        }
    }
}

/// Review and delivery lifecycle of a letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterStatus {
    Draft,
    Approved,
    Rejected,
    Sent,
}

impl LetterStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }
}

/// Raised when an entity is asked to move to a state its current status does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} {entity}: status is '{current}', expected {required}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub action: &'static str,
    pub current: &'static str,
    pub required: &'static str,
}

/// Company aggregate built from ingested postings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub url: String,
    pub industry: String,
    pub score: f64,
    pub vacancy_count: u32,
    pub main_skills: BTreeSet<String>,
    pub status: CompanyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the repository on every successful write.
    pub version: u64,
}

impl Company {
    /// Returns `false` when the company was already approved.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<bool, TransitionError> {
        match self.status {
            CompanyStatus::New => {
                self.status = CompanyStatus::Approved;
                self.updated_at = now;
                Ok(true)
            }
            CompanyStatus::Approved => Ok(false),
            other => Err(self.refuse("approve", other, "'new'")),
        }
    }

    /// Returns `false` when the company was already rejected.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<bool, TransitionError> {
        match self.status {
            CompanyStatus::New | CompanyStatus::Approved => {
                self.status = CompanyStatus::Rejected;
                self.updated_at = now;
                Ok(true)
            }
            CompanyStatus::Rejected => Ok(false),
            other => Err(self.refuse("reject", other, "'new' or 'approved'")),
        }
    }

    /// Checked before any delivery side effect so dry runs fail the same way.
    pub fn ensure_sendable(&self) -> Result<(), TransitionError> {
        match self.status {
            CompanyStatus::New | CompanyStatus::Approved | CompanyStatus::Sent => Ok(()),
            other => Err(self.refuse("send to", other, "'new', 'approved' or 'sent'")),
        }
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_sendable()?;
        self.status = CompanyStatus::Sent;
        self.updated_at = now;
        Ok(())
    }

    fn refuse(
        &self,
        action: &'static str,
        current: CompanyStatus,
        required: &'static str,
    ) -> TransitionError {
        TransitionError {
            entity: "company",
            action,
            current: current.label(),
            required,
        }
    }
}

/// Insert payload; the repository assigns identity and version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompany {
    pub name: String,
    pub url: String,
    pub industry: String,
    pub score: f64,
    pub vacancy_count: u32,
    pub main_skills: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: VacancyId,
    pub company_id: CompanyId,
    pub position: String,
    pub skills: Vec<String>,
    /// Source posting URL, the re-ingestion dedup key. Empty when the scraper had none.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVacancy {
    pub company_id: CompanyId,
    pub position: String,
    pub skills: Vec<String>,
    pub url: String,
}

/// Company with its owned vacancies, as returned by the detail lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub vacancies: Vec<Vacancy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    pub id: LetterId,
    pub company_id: CompanyId,
    pub template: TemplateKind,
    pub subject: String,
    pub body: String,
    pub status: LetterStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Address the letter was delivered to.
    pub recipient: Option<String>,
    pub version: u64,
}

impl Letter {
    /// Overwrite a draft in place with freshly generated content.
    pub fn regenerate(
        &mut self,
        template: TemplateKind,
        subject: String,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require(LetterStatus::Draft, "regenerate", "'draft'")?;
        self.template = template;
        self.subject = subject;
        self.body = body;
        self.created_at = now;
        Ok(())
    }

    pub fn approve(
        &mut self,
        body: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require(LetterStatus::Draft, "approve", "'draft'")?;
        if let Some(body) = body {
            self.body = body;
        }
        self.status = LetterStatus::Approved;
        self.approved_at = Some(now);
        self.rejected_at = None;
        self.rejection_reason = None;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require(LetterStatus::Draft, "reject", "'draft'")?;
        self.status = LetterStatus::Rejected;
        self.rejected_at = Some(now);
        self.rejection_reason = reason;
        self.approved_at = None;
        Ok(())
    }

    /// Replace the body and return the letter to draft, clearing review metadata.
    pub fn update_text(&mut self, body: String) -> Result<(), TransitionError> {
        if self.status == LetterStatus::Sent {
            return Err(TransitionError {
                entity: "letter",
                action: "edit",
                current: self.status.label(),
                required: "'draft', 'approved' or 'rejected'",
            });
        }
        self.body = body;
        self.status = LetterStatus::Draft;
        self.approved_at = None;
        self.rejected_at = None;
        self.rejection_reason = None;
        Ok(())
    }

    pub fn ensure_sendable(&self) -> Result<(), TransitionError> {
        self.require(LetterStatus::Approved, "send", "'approved'")
    }

    pub fn mark_sent(&mut self, recipient: &str, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_sendable()?;
        self.status = LetterStatus::Sent;
        self.sent_at = Some(now);
        self.recipient = Some(recipient.to_string());
        Ok(())
    }

    fn require(
        &self,
        expected: LetterStatus,
        action: &'static str,
        required: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(TransitionError {
                entity: "letter",
                action,
                current: self.status.label(),
                required,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLetter {
    pub company_id: CompanyId,
    pub template: TemplateKind,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
}

/// Delivery view for a company's most recent letter. Tracking fields stay empty until a real
/// mail provider is wired in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailStatusView {
    pub company_id: CompanyId,
    pub email: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivery_status: DeliveryStatus,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounced: bool,
    pub error: Option<String>,
}

impl EmailStatusView {
    pub fn for_letter(letter: &Letter, email: Option<String>) -> Self {
        let delivery_status = match letter.status {
            LetterStatus::Sent => DeliveryStatus::Delivered,
            LetterStatus::Draft | LetterStatus::Approved | LetterStatus::Rejected => {
                DeliveryStatus::Pending
            }
        };

        Self {
            company_id: letter.company_id,
            email,
            sent_at: letter.sent_at,
            delivery_status,
            opened_at: None,
            clicked_at: None,
            bounced: false,
            error: None,
        }
    }
}
