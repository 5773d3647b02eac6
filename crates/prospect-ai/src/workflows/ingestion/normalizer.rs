use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::parser::ScrapedPosting;
use crate::workflows::scoring::BatchMaxima;

/// Bucket for postings whose employer name is missing or blank.
pub const UNKNOWN_COMPANY: &str = "Unknown company";
pub const UNSPECIFIED_POSITION: &str = "Unspecified";

/// A vacancy waiting to be attached to its company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VacancyDraft {
    pub position: String,
    pub skills: Vec<String>,
    pub url: String,
}

/// Postings of one company within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyAggregate {
    pub name: String,
    /// Taken from the first posting of the group.
    pub url: String,
    pub skills: BTreeSet<String>,
    pub vacancies: Vec<VacancyDraft>,
}

impl CompanyAggregate {
    pub fn vacancy_count(&self) -> u32 {
        u32::try_from(self.vacancies.len()).unwrap_or(u32::MAX)
    }

    pub fn skill_count(&self) -> u32 {
        u32::try_from(self.skills.len()).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedBatch {
    pub companies: BTreeMap<String, CompanyAggregate>,
    pub maxima: BatchMaxima,
    /// Records dropped while parsing.
    pub skipped_records: usize,
}

impl NormalizedBatch {
    pub fn posting_count(&self) -> usize {
        self.companies
            .values()
            .map(|aggregate| aggregate.vacancies.len())
            .sum()
    }
}

pub fn normalize<I>(postings: I) -> NormalizedBatch
where
    I: IntoIterator<Item = ScrapedPosting>,
{
    let mut companies: BTreeMap<String, CompanyAggregate> = BTreeMap::new();

    for posting in postings {
        let name = normalize_company_name(posting.company_name.as_deref());
        let skills: Vec<String> = posting
            .skills
            .iter()
            .filter_map(|skill| normalize_skill(skill))
            .collect();

        let aggregate = companies
            .entry(name.clone())
            .or_insert_with(|| CompanyAggregate {
                name,
                url: posting.company_url.clone().unwrap_or_default(),
                skills: BTreeSet::new(),
                vacancies: Vec::new(),
            });

        aggregate.skills.extend(skills.iter().cloned());
        aggregate.vacancies.push(VacancyDraft {
            position: posting
                .position
                .unwrap_or_else(|| UNSPECIFIED_POSITION.to_string()),
            skills,
            url: posting.vacancy_url.unwrap_or_default(),
        });
    }

    let maxima = BatchMaxima::observe(
        companies
            .values()
            .map(|aggregate| (aggregate.vacancy_count(), aggregate.skill_count())),
    );

    NormalizedBatch {
        companies,
        maxima,
        skipped_records: 0,
    }
}

pub(crate) fn normalize_company_name(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_COMPANY.to_string(),
    }
}

fn normalize_skill(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(name: Option<&str>, skills: &[&str], url: Option<&str>) -> ScrapedPosting {
        ScrapedPosting {
            company_name: name.map(str::to_string),
            company_url: name.map(|n| format!("https://{}.example", n.trim())),
            position: Some("Engineer".to_string()),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            vacancy_url: url.map(str::to_string),
        }
    }

    #[test]
    fn blank_names_share_the_unknown_bucket() {
        let batch = normalize(vec![
            posting(Some(""), &["Rust"], None),
            posting(Some("  "), &["Go"], None),
        ]);

        assert_eq!(batch.companies.len(), 1);
        let unknown = &batch.companies[UNKNOWN_COMPANY];
        assert_eq!(unknown.vacancy_count(), 2);
        assert_eq!(unknown.skill_count(), 2);
    }

    #[test]
    fn missing_names_join_the_same_bucket() {
        let batch = normalize(vec![posting(None, &[], None), posting(Some(""), &[], None)]);
        assert_eq!(batch.companies[UNKNOWN_COMPANY].vacancy_count(), 2);
    }

    #[test]
    fn skills_are_unioned_and_trimmed() {
        let batch = normalize(vec![
            posting(Some("Kontur"), &["Python", " SQL "], Some("https://hh.example/1")),
            posting(Some(" Kontur "), &["SQL", "React", "  "], Some("https://hh.example/2")),
        ]);

        let kontur = &batch.companies["Kontur"];
        let skills: Vec<_> = kontur.skills.iter().map(String::as_str).collect();
        assert_eq!(skills, vec!["Python", "React", "SQL"]);
        assert_eq!(kontur.url, "https://Kontur.example");
        assert_eq!(kontur.vacancies[1].skills, vec!["SQL", "React"]);
    }

    #[test]
    fn maxima_reflect_the_largest_groups() {
        let batch = normalize(vec![
            posting(Some("A"), &["x", "y", "z"], None),
            posting(Some("B"), &["x"], None),
            posting(Some("B"), &["x"], None),
        ]);
        assert_eq!(batch.maxima, BatchMaxima::new(2, 3));
        assert_eq!(batch.posting_count(), 3);
    }

    #[test]
    fn empty_batch_has_unit_maxima() {
        let batch = normalize(Vec::new());
        assert!(batch.companies.is_empty());
        assert_eq!(batch.maxima, BatchMaxima::new(1, 1));
    }

    #[test]
    fn missing_position_gets_placeholder() {
        let mut raw = posting(Some("A"), &[], None);
        raw.position = None;
        let batch = normalize(vec![raw]);
        assert_eq!(batch.companies["A"].vacancies[0].position, UNSPECIFIED_POSITION);
    }
}
