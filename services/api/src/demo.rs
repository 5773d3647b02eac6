use crate::infra::build_service;
use chrono::Utc;
use clap::Args;
use prospect_ai::config::AppConfig;
use prospect_ai::error::AppError;
use prospect_ai::workflows::ingestion::{CompanyImporter, ScoredCompany};
use prospect_ai::workflows::outreach::TOP_COMPANY_LIMIT;
use serde::Serialize;
use std::io::Cursor;
use std::path::PathBuf;

const SAMPLE_POSTINGS: &str = r#"{"company_name":"Acme Robotics","company_url":"https://acme.example","position":"Embedded Engineer","main_skills":["Rust","C"],"vacancy_url":"https://jobs.example/acme/1"}
{"company_name":"Acme Robotics","company_url":"https://acme.example","position":"Backend Developer","main_skills":["Rust","PostgreSQL","Docker"],"vacancy_url":"https://jobs.example/acme/2"}
{"company_name":"Nord Metals","company_url":"https://nord.example","position":"Process Analyst","main_skills":["Python"],"vacancy_url":"https://jobs.example/nord/1"}
{"company_name":"","position":"Intern","main_skills":"Excel"}"#;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Scraped postings to use instead of the bundled sample
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,
    /// Recipient address for the demo send
    #[arg(long, default_value = "partners@acme.example")]
    pub(crate) email: String,
    /// Letter template (formal or informal)
    #[arg(long, default_value = "formal")]
    pub(crate) template: String,
}

#[derive(Args, Debug)]
pub(crate) struct IngestReportArgs {
    /// Scraper output (JSON array or NDJSON); repeat to merge sources
    #[arg(long = "file", required = true)]
    pub(crate) file: Vec<PathBuf>,
    /// Emit the report as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct IngestReportView {
    generated_at: chrono::DateTime<Utc>,
    policy: &'static str,
    postings: usize,
    skipped_records: usize,
    max_vacancy_count: u32,
    max_skills: u32,
    companies: Vec<ScoredCompany>,
}

pub(crate) fn run_ingest_report(args: IngestReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let batch = CompanyImporter::from_paths(&args.file)?;
    let policy = config.outreach.scoring_policy;

    let view = IngestReportView {
        generated_at: Utc::now(),
        policy: policy.label(),
        postings: batch.posting_count(),
        skipped_records: batch.skipped_records,
        max_vacancy_count: batch.maxima.max_vacancy_count,
        max_skills: batch.maxima.max_skills,
        companies: batch.scored(policy, config.outreach.quality),
    };

    if args.json {
        match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Report serialization failed: {err}"),
        }
        return Ok(());
    }

    println!("Ingestion report ({})", view.generated_at.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "Policy: {} | postings: {} | skipped records: {} | max vacancies: {} | max skills: {}",
        view.policy,
        view.postings,
        view.skipped_records,
        view.max_vacancy_count,
        view.max_skills
    );
    println!("\n{:>6}  {:>9}  {:>6}  Company", "Score", "Vacancies", "Skills");
    for company in &view.companies {
        println!(
            "{:>6.1}  {:>9}  {:>6}  {}",
            company.score,
            company.vacancy_count,
            company.skills.len(),
            company.name
        );
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let (service, outbox) = build_service(config.outreach);

    println!("Partnership outreach demo ({})", Utc::now().format("%Y-%m-%d"));
    println!(
        "Sender: {} <{}>",
        service.config().org_name,
        service.config().contact_email
    );

    let report = match &args.file {
        Some(path) => {
            println!("Data source: {}", path.display());
            service.ingest(std::fs::File::open(path)?)?
        }
        None => {
            println!("Data source: bundled sample postings");
            service.ingest(Cursor::new(SAMPLE_POSTINGS))?
        }
    };
    println!(
        "Ingested {} companies ({} reused), {} vacancies, {} records skipped",
        report.companies_created,
        report.companies_reused,
        report.vacancies_added,
        report.records_skipped
    );

    let top = service.top_companies(TOP_COMPANY_LIMIT)?;
    println!("\nTop companies");
    for company in &top {
        println!(
            "  [{}] {:<28} score {:>5.1}  vacancies {}",
            company.id, company.name, company.score, company.vacancy_count
        );
    }

    let Some(target) = top.first() else {
        println!("\nNo companies ingested; nothing to contact.");
        return Ok(());
    };

    let company = service.approve_company(target.id, Some("demo shortlist"))?;
    println!("\nApproved {} (status: {})", company.name, company.status.label());

    let draft = service.generate_letter(company.id, &args.template)?;
    println!("Generated {} letter #{}: {}", draft.template, draft.id, draft.subject);

    let approved = service.approve_letter(draft.id, None)?;
    println!("Letter #{} status: {}", approved.id, approved.status.label());

    let preview = service.send_email(company.id, &args.email, true)?;
    println!(
        "Dry run to {}: delivery {:?}",
        preview.email.as_deref().unwrap_or("-"),
        preview.delivery_status
    );

    service.send_email(company.id, &args.email, false)?;
    let status = service.email_status(company.id)?;
    println!(
        "Sent to {} at {}: delivery {:?}",
        status.email.as_deref().unwrap_or("-"),
        status
            .sent_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
        status.delivery_status
    );

    let company = service.company_detail(company.id)?;
    println!(
        "Company status: {} | outbox: {} message(s)",
        company.company.status.label(),
        outbox.delivered().len()
    );

    Ok(())
}
