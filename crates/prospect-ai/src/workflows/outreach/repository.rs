use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{
    Company, CompanyId, CompanyStatus, Letter, LetterId, LetterStatus, NewCompany, NewLetter,
    NewVacancy, Vacancy,
};

/// Storage abstraction over companies and their vacancies.
///
/// `update` is a compare-and-swap: it must fail with [`RepositoryError::Conflict`] when the
/// stored version differs from the one carried by the record, and bump the version otherwise.
pub trait CompanyRepository: Send + Sync {
    fn insert(&self, company: NewCompany) -> Result<Company, RepositoryError>;
    fn update(&self, company: Company) -> Result<Company, RepositoryError>;
    fn fetch(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError>;
    fn list(&self, query: &CompanyQuery) -> Result<Page<Company>, RepositoryError>;
    fn vacancies(&self, company_id: CompanyId) -> Result<Vec<Vacancy>, RepositoryError>;
    fn add_vacancy(&self, vacancy: NewVacancy) -> Result<Vacancy, RepositoryError>;
    fn vacancy_url_exists(&self, url: &str) -> Result<bool, RepositoryError>;
}

/// Storage abstraction over letters. Same compare-and-swap contract as companies.
pub trait LetterRepository: Send + Sync {
    fn insert(&self, letter: NewLetter) -> Result<Letter, RepositoryError>;
    fn update(&self, letter: Letter) -> Result<Letter, RepositoryError>;
    fn fetch(&self, id: LetterId) -> Result<Option<Letter>, RepositoryError>;
    fn draft_for_company(&self, company_id: CompanyId) -> Result<Option<Letter>, RepositoryError>;
    /// Most recently created letter; ties resolve to the higher id.
    fn latest_for_company(&self, company_id: CompanyId)
        -> Result<Option<Letter>, RepositoryError>;
    fn list(&self, query: &LetterQuery) -> Result<Page<Letter>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery hook. The shipped adapter only logs.
pub trait EmailSender: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub company_id: CompanyId,
    pub letter_id: LetterId,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email transport unavailable: {0}")]
    Transport(String),
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Validated 1-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, String> {
        if page == 0 {
            return Err("page must be at least 1".to_string());
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(format!("limit must be between 1 and {MAX_PAGE_LIMIT}"));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered result set.
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let pages = total.div_ceil(request.limit as usize) as u32;
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();

        Self {
            data,
            total,
            page: request.page,
            limit: request.limit,
            pages,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySort {
    #[default]
    ScoreDesc,
    ScoreAsc,
    NameAsc,
    NameDesc,
}

impl CompanySort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "score_desc" => Some(Self::ScoreDesc),
            "score_asc" => Some(Self::ScoreAsc),
            "name_asc" => Some(Self::NameAsc),
            "name_desc" => Some(Self::NameDesc),
            _ => None,
        }
    }

    /// Ties fall back to ascending id so paging is stable.
    pub fn compare(self, a: &Company, b: &Company) -> Ordering {
        let primary = match self {
            Self::ScoreDesc => b.score.total_cmp(&a.score),
            Self::ScoreAsc => a.score.total_cmp(&b.score),
            Self::NameAsc => a.name.cmp(&b.name),
            Self::NameDesc => b.name.cmp(&a.name),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyQuery {
    pub status: Option<CompanyStatus>,
    pub industry: Option<String>,
    pub min_score: Option<f64>,
    pub sort: CompanySort,
    pub page: PageRequest,
}

impl CompanyQuery {
    pub fn matches(&self, company: &Company) -> bool {
        self.status.map_or(true, |status| company.status == status)
            && self
                .industry
                .as_deref()
                .map_or(true, |industry| company.industry == industry)
            && self.min_score.map_or(true, |min| company.score >= min)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterQuery {
    pub status: Option<LetterStatus>,
    pub company_id: Option<CompanyId>,
    pub page: PageRequest,
}

impl LetterQuery {
    pub fn matches(&self, letter: &Letter) -> bool {
        self.status.map_or(true, |status| letter.status == status)
            && self.company_id.map_or(true, |id| letter.company_id == id)
    }
}
