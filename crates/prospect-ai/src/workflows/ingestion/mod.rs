//! Scraped posting ingestion: parse, group per company, score, and persist.

mod normalizer;
mod parser;

pub use normalizer::{
    normalize, CompanyAggregate, NormalizedBatch, VacancyDraft, UNKNOWN_COMPANY,
    UNSPECIFIED_POSITION,
};
pub use parser::ScrapedPosting;

use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::workflows::outreach::domain::{NewCompany, NewVacancy};
use crate::workflows::outreach::repository::{CompanyRepository, RepositoryError};
use crate::workflows::scoring::{self, BatchMaxima, QualitySignals, ScoreInput, ScoringPolicy};

/// Catch-all industry tag; scrapers do not classify employers.
pub const DEFAULT_INDUSTRY: &str = "IT / Industrial / Other";

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("failed to read scraped postings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scraped posting JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not store ingested companies: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct CompanyImporter;

impl CompanyImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<NormalizedBatch, IngestionError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Concatenate several scraper outputs into one batch so maxima span all sources.
    pub fn from_paths<I, P>(paths: I) -> Result<NormalizedBatch, IngestionError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut postings = Vec::new();
        let mut skipped = 0;
        for path in paths {
            let parsed = parser::parse_postings(std::fs::File::open(path)?)?;
            postings.extend(parsed.postings);
            skipped += parsed.skipped;
        }

        let mut batch = normalize(postings);
        batch.skipped_records = skipped;
        Ok(batch)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<NormalizedBatch, IngestionError> {
        let parsed = parser::parse_postings(reader)?;
        let mut batch = normalize(parsed.postings);
        batch.skipped_records = parsed.skipped;
        Ok(batch)
    }
}

/// Score preview for one aggregate, used by reports before anything is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCompany {
    pub name: String,
    pub url: String,
    pub vacancy_count: u32,
    pub skills: Vec<String>,
    pub score: f64,
}

impl NormalizedBatch {
    pub fn score_for(
        &self,
        aggregate: &CompanyAggregate,
        policy: ScoringPolicy,
        signals: QualitySignals,
    ) -> f64 {
        scoring::score(
            policy,
            ScoreInput {
                vacancy_count: aggregate.vacancy_count(),
                skills_found: aggregate.skill_count(),
            },
            self.maxima,
            signals,
        )
    }

    /// Aggregates ordered by descending score, then name.
    pub fn scored(&self, policy: ScoringPolicy, signals: QualitySignals) -> Vec<ScoredCompany> {
        let mut scored: Vec<ScoredCompany> = self
            .companies
            .values()
            .map(|aggregate| ScoredCompany {
                name: aggregate.name.clone(),
                url: aggregate.url.clone(),
                vacancy_count: aggregate.vacancy_count(),
                skills: aggregate.skills.iter().cloned().collect(),
                score: self.score_for(aggregate, policy, signals),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        scored
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub companies_created: usize,
    pub companies_reused: usize,
    pub vacancies_added: usize,
    pub vacancies_skipped: usize,
    pub records_skipped: usize,
    pub max_vacancy_count: u32,
    pub max_skills: u32,
}

/// Persist a batch. Existing companies are matched by exact name and keep their original
/// score, URL and stored `vacancy_count`; only vacancies with unseen source URLs are appended,
/// so a reused company may own more vacancy rows than its count reports.
pub fn ingest<C>(
    batch: &NormalizedBatch,
    companies: &C,
    policy: ScoringPolicy,
    signals: QualitySignals,
) -> Result<IngestionReport, IngestionError>
where
    C: CompanyRepository + ?Sized,
{
    let BatchMaxima {
        max_vacancy_count,
        max_skills,
    } = batch.maxima;
    let mut report = IngestionReport {
        records_skipped: batch.skipped_records,
        max_vacancy_count,
        max_skills,
        ..IngestionReport::default()
    };

    for aggregate in batch.companies.values() {
        let company = match companies.find_by_name(&aggregate.name)? {
            Some(existing) => {
                report.companies_reused += 1;
                existing
            }
            None => {
                let score = batch.score_for(aggregate, policy, signals);
                let created = companies.insert(NewCompany {
                    name: aggregate.name.clone(),
                    url: aggregate.url.clone(),
                    industry: DEFAULT_INDUSTRY.to_string(),
                    score,
                    vacancy_count: aggregate.vacancy_count(),
                    main_skills: aggregate.skills.clone(),
                })?;
                debug!(company = %created.name, score, "created company from postings");
                report.companies_created += 1;
                created
            }
        };

        for vacancy in &aggregate.vacancies {
            if !vacancy.url.is_empty() && companies.vacancy_url_exists(&vacancy.url)? {
                report.vacancies_skipped += 1;
                continue;
            }

            companies.add_vacancy(NewVacancy {
                company_id: company.id,
                position: vacancy.position.clone(),
                skills: vacancy.skills.clone(),
                url: vacancy.url.clone(),
            })?;
            report.vacancies_added += 1;
        }
    }

    info!(
        created = report.companies_created,
        reused = report.companies_reused,
        vacancies = report.vacancies_added,
        skipped_vacancies = report.vacancies_skipped,
        skipped_records = report.records_skipped,
        policy = policy.label(),
        "ingestion batch applied"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::outreach::domain::CompanyStatus;
    use crate::workflows::outreach::memory::InMemoryCompanyRepository;
    use std::io::Cursor;

    const POSTINGS: &str = r#"[
        {"company_name": "Kontur", "company_url": "https://kontur.example", "position": "Python Dev", "main_skills": ["Python", "SQL"], "vacancy_url": "https://hh.example/1"},
        {"company_name": "Kontur", "company_url": "https://kontur.example", "position": "React Dev", "main_skills": ["JS", "React"], "vacancy_url": "https://hh.example/2"},
        {"company_name": "Plant No. 5", "position": "Manager", "main_skills": "Excel", "vacancy_url": "https://hh.example/3"}
    ]"#;

    fn batch() -> NormalizedBatch {
        CompanyImporter::from_reader(Cursor::new(POSTINGS)).expect("postings parse")
    }

    #[test]
    fn ingest_creates_scored_companies_with_vacancies() {
        let repository = InMemoryCompanyRepository::default();
        let report = ingest(
            &batch(),
            &repository,
            ScoringPolicy::Normalized,
            QualitySignals::neutral(),
        )
        .expect("ingest");

        assert_eq!(report.companies_created, 2);
        assert_eq!(report.vacancies_added, 3);
        assert_eq!((report.max_vacancy_count, report.max_skills), (2, 4));

        let kontur = repository
            .find_by_name("Kontur")
            .expect("lookup")
            .expect("present");
        assert_eq!(kontur.status, CompanyStatus::New);
        assert_eq!(kontur.vacancy_count, 2);
        assert_eq!(kontur.score, 85.0);
        assert_eq!(kontur.industry, DEFAULT_INDUSTRY);
        assert_eq!(repository.vacancies(kontur.id).expect("vacancies").len(), 2);
    }

    #[test]
    fn reingestion_reuses_companies_and_skips_known_vacancy_urls() {
        let repository = InMemoryCompanyRepository::default();
        ingest(
            &batch(),
            &repository,
            ScoringPolicy::Normalized,
            QualitySignals::neutral(),
        )
        .expect("first run");
        let original = repository
            .find_by_name("Kontur")
            .expect("lookup")
            .expect("present");

        let follow_up = CompanyImporter::from_reader(Cursor::new(
            r#"{"company_name": "Kontur", "company_url": "https://other.example", "main_skills": ["Go"], "vacancy_url": "https://hh.example/1"}
{"company_name": "Kontur", "main_skills": ["Go"], "vacancy_url": "https://hh.example/9"}"#,
        ))
        .expect("ndjson parses");

        let report = ingest(
            &follow_up,
            &repository,
            ScoringPolicy::Normalized,
            QualitySignals::neutral(),
        )
        .expect("second run");

        assert_eq!(report.companies_created, 0);
        assert_eq!(report.companies_reused, 1);
        assert_eq!(report.vacancies_added, 1);
        assert_eq!(report.vacancies_skipped, 1);

        let reused = repository
            .find_by_name("Kontur")
            .expect("lookup")
            .expect("present");
        assert_eq!(reused.url, original.url);
        assert_eq!(reused.score, original.score);
        assert_eq!(reused.vacancy_count, original.vacancy_count);
        assert_eq!(repository.vacancies(reused.id).expect("vacancies").len(), 3);
    }

    #[test]
    fn vacancies_without_urls_are_never_deduplicated() {
        let repository = InMemoryCompanyRepository::default();
        let batch = CompanyImporter::from_reader(Cursor::new(
            r#"[{"company_name": "A"}, {"company_name": "A"}]"#,
        ))
        .expect("parse");

        let report = ingest(
            &batch,
            &repository,
            ScoringPolicy::Normalized,
            QualitySignals::neutral(),
        )
        .expect("ingest");
        assert_eq!(report.vacancies_added, 2);
        assert_eq!(report.vacancies_skipped, 0);
    }

    #[test]
    fn scored_preview_orders_by_score() {
        let scored = batch().scored(ScoringPolicy::Normalized, QualitySignals::neutral());
        let names: Vec<_> = scored.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kontur", "Plant No. 5"]);
        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn from_paths_merges_sources_and_counts_skips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("superjob.json");
        let second = dir.path().join("hh.ndjson");
        std::fs::write(&first, POSTINGS).expect("write");
        std::fs::write(&second, "{\"company_name\": \"Kontur\"}\n{broken\n").expect("write");

        let batch = CompanyImporter::from_paths([&first, &second]).expect("merge");
        assert_eq!(batch.companies["Kontur"].vacancy_count(), 3);
        assert_eq!(batch.skipped_records, 1);
        assert_eq!(batch.maxima.max_vacancy_count, 3);
    }

    #[test]
    fn from_path_propagates_io_errors() {
        match CompanyImporter::from_path("./does-not-exist.json") {
            Err(IngestionError::Io(_)) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
