//! Company fit scoring over scraped hiring signals.
//!
//! Two policies exist. [`ScoringPolicy::Normalized`] is canonical: vacancy and skill counts are
//! divided by the maxima observed in the same ingestion batch and blended with two externally
//! supplied quality factors, producing a score in `[0, 100]`. [`ScoringPolicy::Legacy`] is the
//! older additive heuristic kept for comparison runs; it has no upper bound.

use serde::{Deserialize, Serialize};

const WEIGHT_VACANCIES: f64 = 0.25;
const WEIGHT_SKILLS: f64 = 0.45;
const WEIGHT_SIZE: f64 = 0.15;
const WEIGHT_GROWTH: f64 = 0.15;

const LEGACY_PER_VACANCY: f64 = 5.0;
const LEGACY_PER_SKILL: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    #[default]
    Normalized,
    /// Unbounded additive heuristic. Deprecated in favour of `Normalized`.
    Legacy,
}

impl ScoringPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normalized" | "weighted" => Some(Self::Normalized),
            "legacy" | "additive" => Some(Self::Legacy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normalized => "normalized",
            Self::Legacy => "legacy",
        }
    }
}

/// Largest vacancy and distinct-skill counts observed across one ingestion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMaxima {
    pub max_vacancy_count: u32,
    pub max_skills: u32,
}

impl BatchMaxima {
    /// Zero maxima become 1 so empty batches never divide by zero.
    pub fn new(max_vacancy_count: u32, max_skills: u32) -> Self {
        Self {
            max_vacancy_count: max_vacancy_count.max(1),
            max_skills: max_skills.max(1),
        }
    }

    pub fn observe<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let (vacancies, skills) = counts
            .into_iter()
            .fold((0, 0), |(max_v, max_s), (v, s)| (max_v.max(v), max_s.max(s)));
        Self::new(vacancies, skills)
    }
}

/// Quality factors that cannot be derived from job postings, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    pub company_size_score: f64,
    pub growth_score: f64,
}

impl QualitySignals {
    pub fn new(company_size_score: f64, growth_score: f64) -> Self {
        Self {
            company_size_score: clamp_unit(company_size_score),
            growth_score: clamp_unit(growth_score),
        }
    }

    pub fn neutral() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// Per-company inputs for a single score computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInput {
    pub vacancy_count: u32,
    pub skills_found: u32,
}

pub fn score(
    policy: ScoringPolicy,
    input: ScoreInput,
    maxima: BatchMaxima,
    signals: QualitySignals,
) -> f64 {
    match policy {
        ScoringPolicy::Normalized => normalized_score(input, maxima, signals),
        #[allow(deprecated)]
        ScoringPolicy::Legacy => legacy_score(input),
    }
}

pub fn normalized_score(input: ScoreInput, maxima: BatchMaxima, signals: QualitySignals) -> f64 {
    let maxima = BatchMaxima::new(maxima.max_vacancy_count, maxima.max_skills);
    let vacancy_ratio = ratio(input.vacancy_count, maxima.max_vacancy_count);
    let skills_ratio = ratio(input.skills_found, maxima.max_skills);

    let total = vacancy_ratio * WEIGHT_VACANCIES
        + skills_ratio * WEIGHT_SKILLS
        + clamp_unit(signals.company_size_score) * WEIGHT_SIZE
        + clamp_unit(signals.growth_score) * WEIGHT_GROWTH;

    round_hundredths(total * 100.0)
}

#[deprecated(note = "unbounded; use normalized_score")]
pub fn legacy_score(input: ScoreInput) -> f64 {
    f64::from(input.vacancy_count) * LEGACY_PER_VACANCY
        + f64::from(input.skills_found) * LEGACY_PER_SKILL
}

fn ratio(value: u32, max: u32) -> f64 {
    (f64::from(value) / f64::from(max.max(1))).min(1.0)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
