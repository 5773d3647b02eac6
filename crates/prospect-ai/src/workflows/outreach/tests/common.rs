use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::Value;

use crate::config::OutreachConfig;
use crate::workflows::outreach::domain::{
    Company, CompanyId, Letter, LetterId, NewCompany, NewLetter, NewVacancy, Vacancy,
};
use crate::workflows::outreach::memory::{InMemoryCompanyRepository, InMemoryLetterRepository};
use crate::workflows::outreach::repository::{
    CompanyQuery, CompanyRepository, EmailError, EmailSender, LetterQuery, LetterRepository,
    OutboundEmail, Page, RepositoryError,
};
use crate::workflows::outreach::{outreach_router, OutreachService};

pub(super) type MemoryService =
    OutreachService<InMemoryCompanyRepository, InMemoryLetterRepository, RecordingSender>;

pub(super) fn outreach_config() -> OutreachConfig {
    OutreachConfig {
        org_name: "Ural Federal University".to_string(),
        contact_email: "partners@uni.example".to_string(),
        ..OutreachConfig::default()
    }
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryCompanyRepository>,
    Arc<InMemoryLetterRepository>,
    Arc<RecordingSender>,
) {
    let companies = Arc::new(InMemoryCompanyRepository::default());
    let letters = Arc::new(InMemoryLetterRepository::default());
    let sender = Arc::new(RecordingSender::default());
    let service = OutreachService::new(
        companies.clone(),
        letters.clone(),
        sender.clone(),
        outreach_config(),
    );
    (service, companies, letters, sender)
}

pub(super) fn seed_company(
    companies: &InMemoryCompanyRepository,
    name: &str,
    score: f64,
    skills: &[&str],
) -> Company {
    let main_skills: BTreeSet<String> = skills.iter().map(|skill| skill.to_string()).collect();
    let company = companies
        .insert(NewCompany {
            name: name.to_string(),
            url: format!("https://{}.example", name.to_lowercase()),
            industry: "IT".to_string(),
            score,
            vacancy_count: 1,
            main_skills,
        })
        .expect("company inserted");
    companies
        .add_vacancy(NewVacancy {
            company_id: company.id,
            position: "Backend Developer".to_string(),
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
            url: format!("https://jobs.example/{}", company.id),
        })
        .expect("vacancy inserted");
    company
}

/// Company with an approved formal letter, ready to send.
pub(super) fn approved_letter(
    service: &MemoryService,
    companies: &InMemoryCompanyRepository,
) -> (Company, Letter) {
    let company = seed_company(companies, "Acme", 80.0, &["Rust", "SQL"]);
    let draft = service
        .generate_letter(company.id, "formal")
        .expect("draft generated");
    let letter = service
        .approve_letter(draft.id, None)
        .expect("draft approved");
    (company, letter)
}

pub(super) fn test_router(service: MemoryService) -> Router {
    outreach_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("body is JSON")
}

#[derive(Default)]
pub(super) struct RecordingSender {
    outbox: Mutex<Vec<OutboundEmail>>,
}

impl RecordingSender {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().expect("outbox mutex poisoned").clone()
    }
}

impl EmailSender for RecordingSender {
    fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        self.outbox
            .lock()
            .expect("outbox mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) struct FailingSender;

impl EmailSender for FailingSender {
    fn send(&self, _email: &OutboundEmail) -> Result<(), EmailError> {
        Err(EmailError::Transport("smtp relay refused connection".to_string()))
    }
}

pub(super) struct UnavailableCompanies;

impl CompanyRepository for UnavailableCompanies {
    fn insert(&self, _company: NewCompany) -> Result<Company, RepositoryError> {
        Err(unavailable())
    }

    fn update(&self, _company: Company) -> Result<Company, RepositoryError> {
        Err(unavailable())
    }

    fn fetch(&self, _id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        Err(unavailable())
    }

    fn find_by_name(&self, _name: &str) -> Result<Option<Company>, RepositoryError> {
        Err(unavailable())
    }

    fn list(&self, _query: &CompanyQuery) -> Result<Page<Company>, RepositoryError> {
        Err(unavailable())
    }

    fn vacancies(&self, _company_id: CompanyId) -> Result<Vec<Vacancy>, RepositoryError> {
        Err(unavailable())
    }

    fn add_vacancy(&self, _vacancy: NewVacancy) -> Result<Vacancy, RepositoryError> {
        Err(unavailable())
    }

    fn vacancy_url_exists(&self, _url: &str) -> Result<bool, RepositoryError> {
        Err(unavailable())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// Lets another writer slip in ahead of the next letter update.
#[derive(Default)]
pub(super) struct RacingLetters {
    pub(super) inner: InMemoryLetterRepository,
    race_next_update: AtomicBool,
}

impl RacingLetters {
    pub(super) fn race_next_update(&self) {
        self.race_next_update.store(true, Ordering::SeqCst);
    }
}

impl LetterRepository for RacingLetters {
    fn insert(&self, letter: NewLetter) -> Result<Letter, RepositoryError> {
        self.inner.insert(letter)
    }

    fn update(&self, letter: Letter) -> Result<Letter, RepositoryError> {
        if self.race_next_update.swap(false, Ordering::SeqCst) {
            self.inner.update(letter.clone())?;
        }
        self.inner.update(letter)
    }

    fn fetch(&self, id: LetterId) -> Result<Option<Letter>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn draft_for_company(&self, company_id: CompanyId) -> Result<Option<Letter>, RepositoryError> {
        self.inner.draft_for_company(company_id)
    }

    fn latest_for_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<Letter>, RepositoryError> {
        self.inner.latest_for_company(company_id)
    }

    fn list(&self, query: &LetterQuery) -> Result<Page<Letter>, RepositoryError> {
        self.inner.list(query)
    }
}

/// What another writer does to the company row just before the service's next update lands.
#[derive(Debug, Clone, Copy)]
pub(super) enum CompanyInterference {
    Approve,
    Reject,
    /// Rewrites the row unchanged, which only bumps its version.
    Touch,
    Outage,
}

/// Company store that replays scripted interference, one entry per `update` call.
#[derive(Default)]
pub(super) struct ContendedCompanies {
    pub(super) inner: InMemoryCompanyRepository,
    script: Mutex<VecDeque<CompanyInterference>>,
}

impl ContendedCompanies {
    pub(super) fn interfere(&self, steps: &[CompanyInterference]) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .extend(steps.iter().copied());
    }

    fn concurrent_write(&self, id: CompanyId, change: impl FnOnce(&mut Company)) {
        let mut current = self
            .inner
            .fetch(id)
            .expect("fetch")
            .expect("company stored");
        change(&mut current);
        self.inner.update(current).expect("concurrent write lands");
    }
}

impl CompanyRepository for ContendedCompanies {
    fn insert(&self, company: NewCompany) -> Result<Company, RepositoryError> {
        self.inner.insert(company)
    }

    fn update(&self, company: Company) -> Result<Company, RepositoryError> {
        let step = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front();
        match step {
            None => {}
            Some(CompanyInterference::Approve) => self.concurrent_write(company.id, |current| {
                current.approve(Utc::now()).expect("approvable");
            }),
            Some(CompanyInterference::Reject) => self.concurrent_write(company.id, |current| {
                current.reject(Utc::now()).expect("rejectable");
            }),
            Some(CompanyInterference::Touch) => self.concurrent_write(company.id, |_| {}),
            Some(CompanyInterference::Outage) => {
                return Err(RepositoryError::Unavailable(
                    "company store timed out".to_string(),
                ))
            }
        }
        self.inner.update(company)
    }

    fn fetch(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        self.inner.find_by_name(name)
    }

    fn list(&self, query: &CompanyQuery) -> Result<Page<Company>, RepositoryError> {
        self.inner.list(query)
    }

    fn vacancies(&self, company_id: CompanyId) -> Result<Vec<Vacancy>, RepositoryError> {
        self.inner.vacancies(company_id)
    }

    fn add_vacancy(&self, vacancy: NewVacancy) -> Result<Vacancy, RepositoryError> {
        self.inner.add_vacancy(vacancy)
    }

    fn vacancy_url_exists(&self, url: &str) -> Result<bool, RepositoryError> {
        self.inner.vacancy_url_exists(url)
    }
}

pub(super) type ContendedService =
    OutreachService<ContendedCompanies, InMemoryLetterRepository, RecordingSender>;

/// Service over a scriptable company store with one approved letter for "Acme".
pub(super) fn contended_service() -> (
    ContendedService,
    Arc<ContendedCompanies>,
    Arc<InMemoryLetterRepository>,
    Arc<RecordingSender>,
    Company,
    Letter,
) {
    let companies = Arc::new(ContendedCompanies::default());
    let letters = Arc::new(InMemoryLetterRepository::default());
    let sender = Arc::new(RecordingSender::default());
    let service = OutreachService::new(
        companies.clone(),
        letters.clone(),
        sender.clone(),
        outreach_config(),
    );
    let company = seed_company(&companies.inner, "Acme", 80.0, &["Rust"]);
    let draft = service
        .generate_letter(company.id, "formal")
        .expect("draft generated");
    let letter = service
        .approve_letter(draft.id, None)
        .expect("draft approved");
    (service, companies, letters, sender, company, letter)
}
