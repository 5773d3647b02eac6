use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::domain::{
    Company, CompanyDetail, CompanyId, EmailStatusView, Letter, LetterId, NewLetter,
    TransitionError,
};
use super::letters::{LetterError, LetterGenerator, LetterRequest, TemplateKind};
use super::repository::{
    CompanyQuery, CompanyRepository, CompanySort, EmailError, EmailSender, LetterQuery,
    LetterRepository, OutboundEmail, Page, PageRequest, RepositoryError,
};
use crate::config::OutreachConfig;
use crate::workflows::ingestion::{self, CompanyImporter, IngestionError, IngestionReport};

pub const TOP_COMPANY_LIMIT: u32 = 20;

/// Workflow controller for the outreach pipeline: review companies, draft and review letters,
/// and deliver them.
pub struct OutreachService<C, L, E> {
    companies: Arc<C>,
    letters: Arc<L>,
    email: Arc<E>,
    generator: LetterGenerator,
    config: OutreachConfig,
}

impl<C, L, E> OutreachService<C, L, E>
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    pub fn new(companies: Arc<C>, letters: Arc<L>, email: Arc<E>, config: OutreachConfig) -> Self {
        let generator = LetterGenerator::from_config(&config);
        Self::with_generator(companies, letters, email, generator, config)
    }

    pub fn with_generator(
        companies: Arc<C>,
        letters: Arc<L>,
        email: Arc<E>,
        generator: LetterGenerator,
        config: OutreachConfig,
    ) -> Self {
        Self {
            companies,
            letters,
            email,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &OutreachConfig {
        &self.config
    }

    /// Parse scraped postings and store them, scoring new companies with the configured policy.
    pub fn ingest<R: Read>(&self, reader: R) -> Result<IngestionReport, OutreachError> {
        let batch = CompanyImporter::from_reader(reader)?;
        let report = ingestion::ingest(
            &batch,
            self.companies.as_ref(),
            self.config.scoring_policy,
            self.config.quality,
        )?;
        Ok(report)
    }

    pub fn list_companies(&self, query: &CompanyQuery) -> Result<Page<Company>, OutreachError> {
        Ok(self.companies.list(query)?)
    }

    pub fn top_companies(&self, limit: u32) -> Result<Vec<Company>, OutreachError> {
        let query = CompanyQuery {
            sort: CompanySort::ScoreDesc,
            page: PageRequest::new(1, limit).map_err(OutreachError::InvalidArgument)?,
            ..CompanyQuery::default()
        };
        Ok(self.companies.list(&query)?.data)
    }

    pub fn company_detail(&self, id: CompanyId) -> Result<CompanyDetail, OutreachError> {
        let company = self.fetch_company(id)?;
        let vacancies = self.companies.vacancies(id)?;
        Ok(CompanyDetail { company, vacancies })
    }

    /// The comment is logged only.
    pub fn approve_company(
        &self,
        id: CompanyId,
        comment: Option<&str>,
    ) -> Result<Company, OutreachError> {
        let mut company = self.fetch_company(id)?;
        if !company.approve(Utc::now())? {
            debug!(company_id = %id, "company already approved");
            return Ok(company);
        }

        let company = self.store_company(company)?;
        info!(company_id = %id, comment = comment.unwrap_or_default(), "company approved");
        Ok(company)
    }

    /// The reason is logged only.
    pub fn reject_company(
        &self,
        id: CompanyId,
        reason: Option<&str>,
    ) -> Result<Company, OutreachError> {
        let mut company = self.fetch_company(id)?;
        if !company.reject(Utc::now())? {
            debug!(company_id = %id, "company already rejected");
            return Ok(company);
        }

        let company = self.store_company(company)?;
        info!(company_id = %id, reason = reason.unwrap_or_default(), "company rejected");
        Ok(company)
    }

    /// Create the company's draft, or overwrite the existing one in place.
    pub fn generate_letter(
        &self,
        company_id: CompanyId,
        template: &str,
    ) -> Result<Letter, OutreachError> {
        let kind = TemplateKind::parse(template)?;
        let company = self.fetch_company(company_id)?;

        let request = LetterRequest {
            company_name: company.name.clone(),
            skills: company.main_skills.iter().cloned().collect(),
            contact_email: self.config.contact_email.clone(),
            org_name: self.config.org_name.clone(),
        };
        let generated = self.generator.render(kind, &request)?;
        let now = Utc::now();

        let letter = match self.letters.draft_for_company(company_id)? {
            Some(mut draft) => {
                draft.regenerate(kind, generated.subject, generated.body, now)?;
                let draft = self.store_letter(draft)?;
                debug!(company_id = %company_id, letter_id = %draft.id, "draft regenerated");
                draft
            }
            None => {
                let draft = self.letters.insert(NewLetter {
                    company_id,
                    template: kind,
                    subject: generated.subject,
                    body: generated.body,
                    created_at: now,
                })?;
                debug!(company_id = %company_id, letter_id = %draft.id, "draft created");
                draft
            }
        };

        info!(company_id = %company_id, letter_id = %letter.id, template = %kind, "letter generated");
        Ok(letter)
    }

    pub fn latest_letter(&self, company_id: CompanyId) -> Result<Letter, OutreachError> {
        self.fetch_company(company_id)?;
        self.latest_for(company_id)
    }

    pub fn approve_letter(
        &self,
        id: LetterId,
        body: Option<String>,
    ) -> Result<Letter, OutreachError> {
        if let Some(body) = &body {
            require_text(body, "letter body")?;
        }

        let mut letter = self.fetch_letter(id)?;
        letter.approve(body, Utc::now())?;
        let letter = self.store_letter(letter)?;
        info!(letter_id = %id, company_id = %letter.company_id, "letter approved");
        Ok(letter)
    }

    pub fn reject_letter(
        &self,
        id: LetterId,
        reason: Option<String>,
    ) -> Result<Letter, OutreachError> {
        let mut letter = self.fetch_letter(id)?;
        letter.reject(reason, Utc::now())?;
        let letter = self.store_letter(letter)?;
        info!(
            letter_id = %id,
            reason = letter.rejection_reason.as_deref().unwrap_or_default(),
            "letter rejected"
        );
        Ok(letter)
    }

    /// Replace the body and return the letter to draft. A company keeps at most one draft.
    pub fn update_letter(&self, id: LetterId, body: String) -> Result<Letter, OutreachError> {
        require_text(&body, "letter body")?;
        let mut letter = self.fetch_letter(id)?;

        if let Some(draft) = self.letters.draft_for_company(letter.company_id)? {
            if draft.id != letter.id {
                return Err(OutreachError::ActiveDraftExists {
                    letter: letter.id,
                    draft: draft.id,
                });
            }
        }

        letter.update_text(body)?;
        let letter = self.store_letter(letter)?;
        info!(letter_id = %id, "letter text updated");
        Ok(letter)
    }

    pub fn list_letters(&self, query: &LetterQuery) -> Result<Page<Letter>, OutreachError> {
        Ok(self.letters.list(query)?)
    }

    /// Deliver the company's most recent letter. A dry run performs every check and leaves
    /// stored state untouched.
    pub fn send_email(
        &self,
        company_id: CompanyId,
        email: &str,
        dry_run: bool,
    ) -> Result<EmailStatusView, OutreachError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(OutreachError::InvalidArgument(format!(
                "'{email}' is not a valid recipient address"
            )));
        }

        let company = self.fetch_company(company_id)?;
        let letter = self.latest_for(company_id)?;
        letter.ensure_sendable()?;
        company.ensure_sendable()?;

        if dry_run {
            info!(company_id = %company_id, letter_id = %letter.id, to = email, "dry run send");
            return Ok(EmailStatusView::for_letter(&letter, Some(email.to_string())));
        }

        let now = Utc::now();
        let mut sending = letter.clone();
        sending.mark_sent(email, now)?;
        let sent = self.store_letter(sending)?;

        // Both rows are claimed before delivery; any failure rolls both back.
        let (company_before, company_sent) = match self.mark_company_sent(company) {
            Ok(marked) => marked,
            Err(err) => {
                self.restore_letter(letter, &sent);
                return Err(err);
            }
        };

        let outbound = OutboundEmail {
            company_id,
            letter_id: sent.id,
            to: email.to_string(),
            subject: sent.subject.clone(),
            body: sent.body.clone(),
        };
        if let Err(err) = self.email.send(&outbound) {
            self.restore_letter(letter, &sent);
            self.restore_company(company_before, &company_sent);
            return Err(err.into());
        }

        info!(company_id = %company_id, letter_id = %sent.id, to = email, "letter sent");
        Ok(EmailStatusView::for_letter(&sent, Some(email.to_string())))
    }

    pub fn email_status(&self, company_id: CompanyId) -> Result<EmailStatusView, OutreachError> {
        self.fetch_company(company_id)?;
        let letter = self.latest_for(company_id)?;
        Ok(EmailStatusView::for_letter(&letter, letter.recipient.clone()))
    }

    /// Returns the snapshot the transition started from and the stored result. One reload is
    /// allowed when a concurrent review touched the company mid-send.
    fn mark_company_sent(&self, mut company: Company) -> Result<(Company, Company), OutreachError> {
        let mut reloaded = false;
        loop {
            let before = company.clone();
            company.mark_sent(Utc::now())?;
            match self.companies.update(company.clone()) {
                Ok(stored) => return Ok((before, stored)),
                Err(RepositoryError::Conflict) if !reloaded => {
                    warn!(company_id = %company.id, "company changed during send; reloading");
                    reloaded = true;
                    company = self.fetch_company(company.id)?;
                }
                Err(RepositoryError::Conflict) => return Err(OutreachError::Conflict("company")),
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn restore_letter(&self, previous: Letter, claimed: &Letter) {
        let restored = Letter {
            version: claimed.version,
            ..previous
        };
        if let Err(err) = self.letters.update(restored) {
            warn!(letter_id = %claimed.id, error = %err, "could not restore letter after failed send");
        }
    }

    fn restore_company(&self, previous: Company, claimed: &Company) {
        let restored = Company {
            version: claimed.version,
            ..previous
        };
        if let Err(err) = self.companies.update(restored) {
            warn!(company_id = %claimed.id, error = %err, "could not restore company after failed send");
        }
    }

    fn fetch_company(&self, id: CompanyId) -> Result<Company, OutreachError> {
        self.companies
            .fetch(id)?
            .ok_or_else(|| OutreachError::not_found("company", id))
    }

    fn fetch_letter(&self, id: LetterId) -> Result<Letter, OutreachError> {
        self.letters
            .fetch(id)?
            .ok_or_else(|| OutreachError::not_found("letter", id))
    }

    fn latest_for(&self, company_id: CompanyId) -> Result<Letter, OutreachError> {
        self.letters
            .latest_for_company(company_id)?
            .ok_or_else(|| OutreachError::not_found("letter for company", company_id))
    }

    fn store_company(&self, company: Company) -> Result<Company, OutreachError> {
        self.companies.update(company).map_err(|err| match err {
            RepositoryError::Conflict => OutreachError::Conflict("company"),
            other => other.into(),
        })
    }

    fn store_letter(&self, letter: Letter) -> Result<Letter, OutreachError> {
        self.letters.update(letter).map_err(|err| match err {
            RepositoryError::Conflict => OutreachError::Conflict("letter"),
            other => other.into(),
        })
    }
}

fn require_text(value: &str, field: &str) -> Result<(), OutreachError> {
    if value.trim().is_empty() {
        Err(OutreachError::InvalidArgument(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Boundary classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachErrorKind {
    NotFound,
    InvalidArgument,
    PreconditionFailed,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    PreconditionFailed(#[from] TransitionError),
    #[error("letter {letter} cannot return to draft while letter {draft} is the company's draft")]
    ActiveDraftExists { letter: LetterId, draft: LetterId },
    #[error("{0} was modified concurrently, reload and retry")]
    Conflict(&'static str),
    #[error(transparent)]
    Template(LetterError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

impl OutreachError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> OutreachErrorKind {
        match self {
            Self::NotFound { .. } => OutreachErrorKind::NotFound,
            Self::InvalidArgument(_) => OutreachErrorKind::InvalidArgument,
            Self::PreconditionFailed(_) | Self::ActiveDraftExists { .. } => {
                OutreachErrorKind::PreconditionFailed
            }
            Self::Conflict(_) => OutreachErrorKind::Conflict,
            Self::Template(_) | Self::Email(_) => OutreachErrorKind::Internal,
            Self::Repository(err) => repository_kind(err),
            Self::Ingestion(IngestionError::Json(_)) => OutreachErrorKind::InvalidArgument,
            Self::Ingestion(IngestionError::Repository(err)) => repository_kind(err),
            Self::Ingestion(IngestionError::Io(_)) => OutreachErrorKind::Internal,
        }
    }
}

fn repository_kind(err: &RepositoryError) -> OutreachErrorKind {
    match err {
        RepositoryError::NotFound => OutreachErrorKind::NotFound,
        RepositoryError::Conflict => OutreachErrorKind::Conflict,
        RepositoryError::Unavailable(_) => OutreachErrorKind::Internal,
    }
}

impl From<LetterError> for OutreachError {
    fn from(value: LetterError) -> Self {
        match value {
            invalid @ LetterError::InvalidTemplate(_) => {
                Self::InvalidArgument(invalid.to_string())
            }
            LetterError::TemplateNotFound(name) => Self::NotFound {
                entity: "letter template",
                id: name,
            },
            other => Self::Template(other),
        }
    }
}
