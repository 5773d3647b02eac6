//! Outreach workflow: company review, partnership letter drafting, and delivery.

pub mod domain;
pub mod letters;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Company, CompanyDetail, CompanyId, CompanyStatus, DeliveryStatus, EmailStatusView, Letter,
    LetterId, LetterStatus, NewCompany, NewLetter, NewVacancy, TransitionError, Vacancy,
    VacancyId,
};
pub use letters::{
    BuiltinTemplates, DirectoryTemplates, GeneratedLetter, LetterError, LetterGenerator,
    LetterRequest, LetterTemplate, TemplateKind, TemplateSource,
};
pub use memory::{InMemoryCompanyRepository, InMemoryLetterRepository};
pub use repository::{
    CompanyQuery, CompanyRepository, CompanySort, EmailError, EmailSender, LetterQuery,
    LetterRepository, OutboundEmail, Page, PageRequest, RepositoryError,
};
pub use router::outreach_router;
pub use service::{OutreachError, OutreachErrorKind, OutreachService, TOP_COMPANY_LIMIT};
