mod common;

use common::{count_offers, offer_cash, post_job, setup_db};

use makerboard::error::{ErrorKind, MarketError};
use makerboard::jobs::{JobStatus, JobsRepo, PaymentType};
use makerboard::offers::{NewOffer, OfferFilter, OfferStatus, OffersRepo};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn accepting_a_rejects_b_and_assigns_the_job() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let jobs = JobsRepo::new(pool.clone());

    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4500).await;
    let b = offer_cash(&pool, job.id, "bob", 5500).await;

    let accepted = offers.accept(a.id, "poster").await.unwrap();
    assert_eq!(accepted.offer.status, OfferStatus::Accepted);
    assert_eq!(accepted.job.status, JobStatus::InProgress);
    assert_eq!(accepted.job.claimed_by_id.as_deref(), Some("alice"));
    assert_eq!(accepted.rejected_offer_ids, vec![b.id]);

    let stored_b = offers.get_offer(b.id).await.unwrap().unwrap();
    assert_eq!(stored_b.status, OfferStatus::Rejected);

    let stored_job = jobs.require_job(job.id).await.unwrap();
    assert_eq!(stored_job, accepted.job);
    stored_job.check_invariants().unwrap();
}

#[tokio::test]
#[serial]
async fn concurrent_accepts_leave_one_winner() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());

    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4500).await;
    let b = offer_cash(&pool, job.id, "bob", 5500).await;

    let (ra, rb) = tokio::join!(offers.accept(a.id, "poster"), offers.accept(b.id, "poster"));

    let wins = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1, "exactly one acceptance must succeed");
    let loser = ra.err().or(rb.err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::InvalidState);

    let accepted: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_offers WHERE job_id = $1 AND status = 'ACCEPTED'",
    )
    .bind(job.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(accepted, 1);
}

#[tokio::test]
#[serial]
async fn monetary_offer_without_amount_creates_no_row() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;

    let mut input = NewOffer::monetary(1);
    input.amount_cents = None;
    let err = offers.submit(job.id, "alice", input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(count_offers(&pool, job.id).await, 0);
}

#[tokio::test]
#[serial]
async fn offers_need_an_open_job() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let jobs = JobsRepo::new(pool.clone());

    let job = post_job(&pool, "poster", 5000).await;
    jobs.claim(job.id, "maker").await.unwrap();

    let err = offers
        .submit(job.id, "alice", NewOffer::monetary(4000))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidState { entity: "job", .. }));
}

#[tokio::test]
#[serial]
async fn only_the_proposer_withdraws() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4500).await;

    let err = offers.withdraw(a.id, "poster").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let withdrawn = offers.withdraw(a.id, "alice").await.unwrap();
    assert_eq!(withdrawn.status, OfferStatus::Withdrawn);

    // immutable once resolved
    let err = offers.accept(a.id, "poster").await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidState { entity: "offer", .. }));
}

#[tokio::test]
#[serial]
async fn only_the_poster_rejects() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4500).await;

    let err = offers.reject(a.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let rejected = offers.reject(a.id, "poster").await.unwrap();
    assert_eq!(rejected.status, OfferStatus::Rejected);
}

#[tokio::test]
#[serial]
async fn counter_rejects_the_original_and_files_the_posters_terms() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4000).await;

    let mut terms = NewOffer::monetary(4800);
    terms.message = Some("meet me halfway".into());
    let countered = offers.counter(a.id, "poster", terms).await.unwrap();

    assert_eq!(countered.original.status, OfferStatus::Rejected);
    assert_eq!(countered.counter.status, OfferStatus::Pending);
    assert_eq!(countered.counter.offered_by_id, "poster");
    assert_eq!(countered.counter.job_id, job.id);
    assert_eq!(countered.counter.counter_to_id.as_deref(), Some("alice"));
    assert_eq!(
        countered.counter.message.as_deref(),
        Some("Counter-offer to alice@makers.test: meet me halfway")
    );

    // the poster's own counter is not theirs to accept
    let err = offers.accept(countered.counter.id, "poster").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
#[serial]
async fn proposer_accepts_the_counter_and_takes_the_job() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let jobs = JobsRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4000).await;
    let b = offer_cash(&pool, job.id, "bob", 5500).await;

    let countered = offers
        .counter(a.id, "poster", NewOffer::monetary(4800))
        .await
        .unwrap();
    let counter_id = countered.counter.id;

    // a bystander cannot take it
    let err = offers.accept(counter_id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let accepted = offers.accept(counter_id, "alice").await.unwrap();
    assert_eq!(accepted.offer.status, OfferStatus::Accepted);
    assert_eq!(accepted.job.status, JobStatus::InProgress);
    assert_eq!(accepted.job.claimed_by_id.as_deref(), Some("alice"));
    assert_eq!(accepted.rejected_offer_ids, vec![b.id]);

    let stored = jobs.require_job(job.id).await.unwrap();
    assert_eq!(stored, accepted.job);
    stored.check_invariants().unwrap();

    // alice can now complete the work
    let done = jobs.complete(job.id, "alice", None).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
}

#[tokio::test]
#[serial]
async fn proposer_can_turn_a_counter_down() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;
    let a = offer_cash(&pool, job.id, "alice", 4000).await;

    let countered = offers
        .counter(a.id, "poster", NewOffer::monetary(4800))
        .await
        .unwrap();

    let err = offers.reject(countered.counter.id, "poster").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let rejected = offers.reject(countered.counter.id, "alice").await.unwrap();
    assert_eq!(rejected.status, OfferStatus::Rejected);
}

#[tokio::test]
#[serial]
async fn hybrid_offer_keeps_both_parts() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let job = post_job(&pool, "poster", 5000).await;

    let input = NewOffer {
        payment_type: PaymentType::Hybrid,
        amount_cents: Some(2500),
        in_kind_description: Some("  filament  ".into()),
        message: Some("   ".into()),
        offered_by_email: None,
    };
    let offer = offers.submit(job.id, "alice", input).await.unwrap();
    assert_eq!(offer.amount_cents, Some(2500));
    assert_eq!(offer.in_kind_description.as_deref(), Some("filament"));
    assert_eq!(offer.message, None);
    assert_eq!(offer.terms().summary(), "$25.00 + filament");
}

#[tokio::test]
#[serial]
async fn my_offers_view_filters_by_proposer_and_status() {
    let pool = setup_db().await;
    let offers = OffersRepo::new(pool.clone());
    let first = post_job(&pool, "poster", 5000).await;
    let second = post_job(&pool, "poster", 3000).await;

    let a1 = offer_cash(&pool, first.id, "alice", 4500).await;
    let a2 = offer_cash(&pool, second.id, "alice", 2500).await;
    offer_cash(&pool, first.id, "bob", 4700).await;
    offers.withdraw(a1.id, "alice").await.unwrap();

    let mine = offers
        .list(
            &OfferFilter {
                offered_by: Some("alice".into()),
                ..OfferFilter::default()
            },
            50,
        )
        .await
        .unwrap();
    let ids: Vec<_> = mine.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![a2.id, a1.id]);

    let pending = offers
        .list(
            &OfferFilter {
                offered_by: Some("alice".into()),
                status: Some(OfferStatus::Pending),
                ..OfferFilter::default()
            },
            50,
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, a2.id);
}
