use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Company, CompanyId, CompanyStatus, Letter, LetterId, LetterStatus, NewCompany, NewLetter,
    NewVacancy, Vacancy, VacancyId,
};
use super::repository::{
    CompanyQuery, CompanyRepository, LetterQuery, LetterRepository, Page, RepositoryError,
};

/// Process-local company store used by the service binary and tests.
#[derive(Default, Clone)]
pub struct InMemoryCompanyRepository {
    state: Arc<Mutex<CompanyTables>>,
}

#[derive(Default)]
struct CompanyTables {
    next_company: u64,
    next_vacancy: u64,
    companies: BTreeMap<CompanyId, Company>,
    vacancies: BTreeMap<VacancyId, Vacancy>,
}

impl InMemoryCompanyRepository {
    fn lock(&self) -> Result<MutexGuard<'_, CompanyTables>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("company store lock poisoned".to_string()))
    }
}

impl CompanyRepository for InMemoryCompanyRepository {
    fn insert(&self, company: NewCompany) -> Result<Company, RepositoryError> {
        let mut tables = self.lock()?;
        tables.next_company += 1;
        let now = Utc::now();
        let record = Company {
            id: CompanyId(tables.next_company),
            name: company.name,
            url: company.url,
            industry: company.industry,
            score: company.score,
            vacancy_count: company.vacancy_count,
            main_skills: company.main_skills,
            status: CompanyStatus::New,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        tables.companies.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, mut company: Company) -> Result<Company, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .companies
            .get_mut(&company.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != company.version {
            return Err(RepositoryError::Conflict);
        }
        company.version += 1;
        *stored = company.clone();
        Ok(company)
    }

    fn fetch(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.lock()?.companies.get(&id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        Ok(self
            .lock()?
            .companies
            .values()
            .find(|company| company.name == name)
            .cloned())
    }

    fn list(&self, query: &CompanyQuery) -> Result<Page<Company>, RepositoryError> {
        let tables = self.lock()?;
        let mut matching: Vec<Company> = tables
            .companies
            .values()
            .filter(|company| query.matches(company))
            .cloned()
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));
        Ok(Page::paginate(matching, query.page))
    }

    fn vacancies(&self, company_id: CompanyId) -> Result<Vec<Vacancy>, RepositoryError> {
        Ok(self
            .lock()?
            .vacancies
            .values()
            .filter(|vacancy| vacancy.company_id == company_id)
            .cloned()
            .collect())
    }

    fn add_vacancy(&self, vacancy: NewVacancy) -> Result<Vacancy, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.companies.contains_key(&vacancy.company_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.next_vacancy += 1;
        let record = Vacancy {
            id: VacancyId(tables.next_vacancy),
            company_id: vacancy.company_id,
            position: vacancy.position,
            skills: vacancy.skills,
            url: vacancy.url,
        };
        tables.vacancies.insert(record.id, record.clone());
        Ok(record)
    }

    fn vacancy_url_exists(&self, url: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .lock()?
            .vacancies
            .values()
            .any(|vacancy| vacancy.url == url))
    }
}

/// Process-local letter store used by the service binary and tests.
#[derive(Default, Clone)]
pub struct InMemoryLetterRepository {
    state: Arc<Mutex<LetterTable>>,
}

#[derive(Default)]
struct LetterTable {
    next_letter: u64,
    letters: BTreeMap<LetterId, Letter>,
}

impl InMemoryLetterRepository {
    fn lock(&self) -> Result<MutexGuard<'_, LetterTable>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("letter store lock poisoned".to_string()))
    }

    /// Number of stored letters, drafts and history alike.
    pub fn len(&self) -> usize {
        self.lock().map(|table| table.letters.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LetterRepository for InMemoryLetterRepository {
    fn insert(&self, letter: NewLetter) -> Result<Letter, RepositoryError> {
        let mut table = self.lock()?;
        table.next_letter += 1;
        let record = Letter {
            id: LetterId(table.next_letter),
            company_id: letter.company_id,
            template: letter.template,
            subject: letter.subject,
            body: letter.body,
            status: LetterStatus::Draft,
            created_at: letter.created_at,
            approved_at: None,
            rejected_at: None,
            sent_at: None,
            rejection_reason: None,
            recipient: None,
            version: 1,
        };
        table.letters.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, mut letter: Letter) -> Result<Letter, RepositoryError> {
        let mut table = self.lock()?;
        let stored = table
            .letters
            .get_mut(&letter.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != letter.version {
            return Err(RepositoryError::Conflict);
        }
        letter.version += 1;
        *stored = letter.clone();
        Ok(letter)
    }

    fn fetch(&self, id: LetterId) -> Result<Option<Letter>, RepositoryError> {
        Ok(self.lock()?.letters.get(&id).cloned())
    }

    fn draft_for_company(&self, company_id: CompanyId) -> Result<Option<Letter>, RepositoryError> {
        Ok(self
            .lock()?
            .letters
            .values()
            .find(|letter| letter.company_id == company_id && letter.status == LetterStatus::Draft)
            .cloned())
    }

    fn latest_for_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<Letter>, RepositoryError> {
        Ok(self
            .lock()?
            .letters
            .values()
            .filter(|letter| letter.company_id == company_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    fn list(&self, query: &LetterQuery) -> Result<Page<Letter>, RepositoryError> {
        let table = self.lock()?;
        let matching: Vec<Letter> = table
            .letters
            .values()
            .filter(|letter| query.matches(letter))
            .cloned()
            .collect();
        Ok(Page::paginate(matching, query.page))
    }
}
