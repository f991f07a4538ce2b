use std::collections::HashMap;
use std::env;

use anyhow::Context;
use makerboard::config::Config;
use makerboard::db;
use makerboard::jobs::terms::format_usd;
use makerboard::jobs::timeline::{build_timeline, TimelineEvent};
use makerboard::jobs::{
    poll_until, JobCategory, JobStatus, JobsRepo, NewJob, PaymentType, PollOutcome, StatsRepo,
};
use makerboard::offers::{NewOffer, OffersRepo};
use makerboard::sync::StaticSource;
use sqlx::PgPool;
use uuid::Uuid;

const USAGE: &str = "boardctl <command>\n\
     Commands:\n\
     - reset\n\
     - seed [n]\n\
     - demo\n\
     - counts\n\
     - timeline <job_id>\n\
     - watch <job_id> <STATUS>\n\
     \n\
     Uses DATABASE_URL or TEST_DATABASE_URL.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .context("DATABASE_URL or TEST_DATABASE_URL must be set")?;
    let cfg = Config::with_database_url(url);
    let pool = db::make_pool(&cfg.database_url).await?;

    match args[1].as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&pool, n).await?;
        }
        "demo" => {
            reset(&pool).await?;
            load_demo(&pool).await?;
            show_counts(&pool).await?;
        }
        "counts" => show_counts(&pool).await?,
        "timeline" => {
            let job_id: Uuid = args
                .get(2)
                .context("usage: boardctl timeline <job_id>")?
                .parse()?;
            print_timeline(&pool, job_id).await?;
        }
        "watch" => {
            let job_id: Uuid = args
                .get(2)
                .context("usage: boardctl watch <job_id> <STATUS>")?
                .parse()?;
            let wanted = args
                .get(3)
                .and_then(|s| JobStatus::parse(s))
                .context("STATUS must be one of OPEN, IN_PROGRESS, COMPLETED, CANCELLED")?;
            watch(&pool, &cfg, job_id, wanted).await?;
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("TRUNCATE TABLE job_offers, jobs CASCADE")
        .execute(pool)
        .await?;

    println!("reset OK");
    Ok(())
}

/// Posts `n` jobs cycling through categories and payment types, and puts
/// an offer on every third one.
async fn seed(pool: &PgPool, n: usize) -> anyhow::Result<()> {
    let jobs = JobsRepo::new(pool.clone());
    let offers = OffersRepo::new(pool.clone());

    for i in 0..n {
        let category = JobCategory::ALL[i % JobCategory::ALL.len()];
        let payment_type = PaymentType::ALL[i % PaymentType::ALL.len()];
        let poster = format!("seed_poster_{}", i % 3);

        let input = NewJob {
            title: format!("Seed job #{}", i + 1),
            category,
            description: format!("Generated {} job", category.label().to_lowercase()),
            payment_type,
            budget_cents: payment_type.needs_amount().then_some(1_000 + 500 * i as i64),
            in_kind_description: payment_type.needs_in_kind().then(|| "shop snacks".to_string()),
            service_type: None,
            is_standard_rate: false,
            deadline_at: None,
            posted_by_email: Some(format!("{poster}@makers.test")),
        };
        let job = jobs.create(&poster, input).await?;
        println!("+ posted {} {} id={}", job.category.as_str(), job.payment_type.as_str(), job.id);

        if i % 3 == 0 {
            let offer = offers
                .submit(job.id, "seed_maker", NewOffer::monetary(1_200 + 100 * i as i64))
                .await?;
            println!("  + offer {} id={}", offer.terms().summary(), offer.id);
        }
    }
    Ok(())
}

/// Writes the bundled demo board into the database. Ids are reassigned.
async fn load_demo(pool: &PgPool) -> anyhow::Result<()> {
    let demo = StaticSource::demo()?;
    let jobs = JobsRepo::new(pool.clone());
    let offers = OffersRepo::new(pool.clone());

    let mut ids = HashMap::new();
    for job in &demo.jobs {
        let input = NewJob {
            title: job.title.clone(),
            category: job.category,
            description: job.description.clone(),
            payment_type: job.payment_type,
            budget_cents: job.budget_cents,
            in_kind_description: job.in_kind_description.clone(),
            service_type: job.service_type,
            is_standard_rate: job.is_standard_rate,
            deadline_at: None,
            posted_by_email: job.posted_by_email.clone(),
        };
        let created = jobs.create(&job.posted_by_id, input).await?;
        println!("+ demo job \"{}\" id={}", created.title, created.id);
        ids.insert(job.id, created.id);
    }

    for offer in &demo.offers {
        let Some(&job_id) = ids.get(&offer.job_id) else {
            continue;
        };
        let input = NewOffer {
            payment_type: offer.payment_type,
            amount_cents: offer.amount_cents,
            in_kind_description: offer.in_kind_description.clone(),
            message: offer.message.clone(),
            offered_by_email: offer.offered_by_email.clone(),
        };
        let created = offers.submit(job_id, &offer.offered_by_id, input).await?;
        println!("+ demo offer {} id={}", created.terms().summary(), created.id);
    }
    Ok(())
}

async fn show_counts(pool: &PgPool) -> anyhow::Result<()> {
    let snap = StatsRepo::new(pool.clone()).board().await?;
    let s = snap.stats;
    println!(
        "jobs: open={} in_progress={} completed={} cancelled={} open_value={} pending_offers={}",
        s.open,
        s.in_progress,
        s.completed,
        s.cancelled,
        format_usd(s.open_value_cents),
        s.pending_offers
    );
    Ok(())
}

async fn print_timeline(pool: &PgPool, job_id: Uuid) -> anyhow::Result<()> {
    let jobs = JobsRepo::new(pool.clone());
    let offers = OffersRepo::new(pool.clone());

    let Some(tl) = build_timeline(&jobs, &offers, job_id).await? else {
        anyhow::bail!("job {job_id} not found");
    };

    println!("=== {} ({}) ===", tl.title, tl.status.as_str());
    println!("posted by {}", tl.posted_by_id);
    if let Some(claimant) = &tl.claimed_by_id {
        println!("claimed by {claimant}");
    }
    println!("pending offers: {}", tl.pending_offers);
    println!();

    for event in &tl.story {
        println!("{}", describe(event));
    }
    Ok(())
}

fn describe(event: &TimelineEvent) -> String {
    match event {
        TimelineEvent::Posted { at, by, terms } => format!("{at}  posted by {by} for {terms}"),
        TimelineEvent::OfferSubmitted {
            at,
            offer_id,
            by,
            terms,
            message,
        } => {
            let mut line = format!("{at}  offer {offer_id} from {by}: {terms}");
            if let Some(m) = message {
                line.push_str(&format!(" \"{m}\""));
            }
            line
        }
        TimelineEvent::OfferResolved {
            at,
            offer_id,
            by,
            outcome,
        } => format!("{at}  offer {offer_id} {} by {by}", outcome.as_str()),
        TimelineEvent::Claimed { at, by } => format!("{at}  claimed by {by}"),
        TimelineEvent::Completed {
            at,
            by,
            deliverable_url,
        } => format!(
            "{at}  completed by {} deliverable={}",
            by.as_deref().unwrap_or("-"),
            deliverable_url.as_deref().unwrap_or("-")
        ),
        TimelineEvent::Cancelled { at } => format!("{at}  cancelled"),
    }
}

/// Waits until the job reaches `wanted`, e.g. to confirm an action made
/// elsewhere became visible.
async fn watch(pool: &PgPool, cfg: &Config, job_id: Uuid, wanted: JobStatus) -> anyhow::Result<()> {
    let jobs = JobsRepo::new(pool.clone());
    println!(
        "waiting for job {job_id} to become {} (every {:?}, up to {:?})",
        wanted.as_str(),
        cfg.poll_interval(),
        cfg.poll_timeout()
    );

    let jobs = &jobs;
    let outcome = poll_until(cfg.poll_interval(), cfg.poll_timeout(), || async move {
        let job = jobs.require_job(job_id).await?;
        anyhow::Ok((job.status == wanted).then_some(job))
    })
    .await;

    match outcome {
        PollOutcome::Ready(job) => {
            println!("job {} is {}", job.id, job.status.as_str());
            if let Some(url) = &job.deliverable_url {
                println!("deliverable: {url}");
            }
            Ok(())
        }
        PollOutcome::TimedOut { attempts } => {
            anyhow::bail!("gave up after {attempts} checks; job {job_id} never became {}", wanted.as_str())
        }
    }
}
