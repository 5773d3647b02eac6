use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::io::Read;
use tracing::warn;

use super::IngestionError;

/// One scraped job posting after field-level cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrapedPosting {
    pub company_name: Option<String>,
    pub company_url: Option<String>,
    pub position: Option<String>,
    pub skills: Vec<String>,
    pub vacancy_url: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ParsedPostings {
    pub(crate) postings: Vec<ScrapedPosting>,
    pub(crate) skipped: usize,
}

/// Accepts a JSON array of postings or newline-delimited JSON objects.
pub(crate) fn parse_postings<R: Read>(mut reader: R) -> Result<ParsedPostings, IngestionError> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    let trimmed = raw.trim_start_matches('\u{feff}').trim();

    let mut parsed = ParsedPostings::default();
    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)?;
        for (index, value) in values.into_iter().enumerate() {
            push_value(&mut parsed, index + 1, value);
        }
        return Ok(parsed);
    }

    for (index, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => push_value(&mut parsed, index + 1, value),
            Err(err) => {
                warn!(record = index + 1, error = %err, "skipping unparseable posting line");
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

fn push_value(parsed: &mut ParsedPostings, record: usize, value: Value) {
    match serde_json::from_value::<RawPosting>(value) {
        Ok(raw) => parsed.postings.push(raw.into_posting(record)),
        Err(err) => {
            warn!(record, error = %err, "skipping malformed posting");
            parsed.skipped += 1;
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPosting {
    #[serde(default)]
    company_name: Option<NameField>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    company_url: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    position: Option<String>,
    #[serde(default)]
    main_skills: Option<SkillsField>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    vacancy_url: Option<String>,
}

/// Scrapers occasionally emit numeric employer names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameField {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillsField {
    One(String),
    Many(Vec<Value>),
}

impl RawPosting {
    fn into_posting(self, record: usize) -> ScrapedPosting {
        let company_name = self.company_name.map(|name| match name {
            NameField::Text(text) => text,
            NameField::Number(number) => number.to_string(),
        });

        let skills = match self.main_skills {
            None => Vec::new(),
            Some(SkillsField::One(skill)) => vec![skill],
            Some(SkillsField::Many(values)) => values
                .into_iter()
                .filter_map(|value| match value {
                    Value::String(skill) => Some(skill),
                    other => {
                        warn!(record, value = %other, "dropping non-string skill tag");
                        None
                    }
                })
                .collect(),
        };

        ScrapedPosting {
            company_name,
            company_url: self.company_url,
            position: self.position,
            skills,
            vacancy_url: self.vacancy_url,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}
