pub mod ingestion;
pub mod outreach;
pub mod scoring;
