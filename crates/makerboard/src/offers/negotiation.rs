//! Offer negotiation rules. Like the job lifecycle these are pure: the
//! repository loads the rows under lock, calls in here, and writes back
//! whatever changed.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::jobs::lifecycle;
use crate::jobs::model::{normalize_email, Job, JobStatus};
use crate::offers::model::{NewOffer, Offer, OfferStatus};

fn require_open_job(job: &Job, action: &'static str) -> MarketResult<()> {
    if job.status != JobStatus::Open {
        return Err(MarketError::InvalidState {
            entity: "job",
            id: job.id,
            status: job.status.as_str(),
            action,
        });
    }
    Ok(())
}

fn require_pending(offer: &Offer, action: &'static str) -> MarketResult<()> {
    if offer.status != OfferStatus::Pending {
        return Err(MarketError::InvalidState {
            entity: "offer",
            id: offer.id,
            status: offer.status.as_str(),
            action,
        });
    }
    Ok(())
}

fn require_on_job(job: &Job, offer: &Offer) -> MarketResult<()> {
    if offer.job_id != job.id {
        return Err(MarketError::offer_not_found(offer.id));
    }
    Ok(())
}

/// Offers are answered by the poster, counter-offers by the member they
/// are addressed to.
fn require_responder(job: &Job, offer: &Offer, actor: &str, verb: &str) -> MarketResult<()> {
    match offer.counter_to_id.as_deref() {
        Some(addressee) if addressee == actor => Ok(()),
        Some(_) if job.is_posted_by(actor) => Err(MarketError::unauthorized(
            "your own counter-offer is waiting on the other member",
        )),
        Some(_) => Err(MarketError::unauthorized(format!(
            "only the member it was made to can {verb} this counter-offer"
        ))),
        None if job.is_posted_by(actor) => Ok(()),
        None => Err(MarketError::unauthorized(format!(
            "only the job poster can {verb} offers"
        ))),
    }
}

/// Checks the proposed terms against the job and normalizes them.
fn validated_terms(job: &Job, mut input: NewOffer) -> MarketResult<NewOffer> {
    require_open_job(job, "make an offer on")?;

    let terms = input.terms().normalized("amount_cents")?;
    input.payment_type = terms.payment_type;
    input.amount_cents = terms.amount_cents;
    input.in_kind_description = terms.in_kind_description;
    input.message = input
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    input.offered_by_email = normalize_email(input.offered_by_email.take(), "offered_by_email")?;
    Ok(input)
}

/// A prospective worker proposes terms on an OPEN job. Posters answer
/// offers with [`counter`] instead of bidding on their own job.
pub fn submit(job: &Job, proposer: &str, input: NewOffer) -> MarketResult<NewOffer> {
    let input = validated_terms(job, input)?;
    if job.is_posted_by(proposer) {
        return Err(MarketError::unauthorized(
            "you cannot make an offer on a job you posted",
        ));
    }
    Ok(input)
}

pub fn withdraw(offer: &mut Offer, actor: &str, now: DateTime<Utc>) -> MarketResult<()> {
    require_pending(offer, "withdraw")?;
    if offer.offered_by_id != actor {
        return Err(MarketError::unauthorized("only the proposer can withdraw this offer"));
    }
    offer.status = OfferStatus::Withdrawn;
    offer.updated_at = now;
    Ok(())
}

pub fn reject(job: &Job, offer: &mut Offer, actor: &str, now: DateTime<Utc>) -> MarketResult<()> {
    require_on_job(job, offer)?;
    require_pending(offer, "reject")?;
    require_responder(job, offer, actor, "reject")?;
    offer.status = OfferStatus::Rejected;
    offer.updated_at = now;
    Ok(())
}

/// `offer` is taken: the job goes to its beneficiary (the proposer, or the
/// addressee of a counter-offer) and every other PENDING offer in
/// `siblings` is rejected. Returns the ids it rejected.
///
/// Nothing is modified unless every check passes.
pub fn accept(
    job: &mut Job,
    offer: &mut Offer,
    siblings: &mut [Offer],
    actor: &str,
    now: DateTime<Utc>,
) -> MarketResult<Vec<Uuid>> {
    require_on_job(job, offer)?;
    require_open_job(job, "accept an offer on")?;
    require_pending(offer, "accept")?;
    require_responder(job, offer, actor, "accept")?;
    if job.is_posted_by(offer.beneficiary()) {
        return Err(MarketError::unauthorized("you cannot take on a job you posted"));
    }

    offer.status = OfferStatus::Accepted;
    offer.updated_at = now;
    lifecycle::assign(job, offer.beneficiary(), now);

    let mut rejected = Vec::new();
    for sibling in siblings
        .iter_mut()
        .filter(|s| s.id != offer.id && s.job_id == job.id && s.status == OfferStatus::Pending)
    {
        sibling.status = OfferStatus::Rejected;
        sibling.updated_at = now;
        rejected.push(sibling.id);
    }
    Ok(rejected)
}

/// Poster answers `original` with terms of their own: the original is
/// rejected and the returned input is submitted as a new PENDING offer
/// by the poster, addressed to the original proposer.
pub fn counter(
    job: &Job,
    original: &mut Offer,
    actor: &str,
    input: NewOffer,
    now: DateTime<Utc>,
) -> MarketResult<NewOffer> {
    require_on_job(job, original)?;
    let mut input = validated_terms(job, input)?;
    require_pending(original, "counter")?;
    if !job.is_posted_by(actor) {
        return Err(MarketError::unauthorized("only the job poster can counter an offer"));
    }
    if original.is_counter() {
        return Err(MarketError::unauthorized(
            "your own counter-offer is waiting on the other member",
        ));
    }

    input.message = Some(counter_message(original, input.message.as_deref()));
    original.status = OfferStatus::Rejected;
    original.updated_at = now;
    Ok(input)
}

fn counter_message(original: &Offer, message: Option<&str>) -> String {
    format!(
        "Counter-offer to {}: {}",
        original.proposer_contact(),
        message.unwrap_or_default()
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{open_job, pending_offer};
    use crate::jobs::terms::{PaymentTerms, PaymentType};

    #[test]
    fn accepting_one_offer_rejects_the_others() {
        // $50 bounty, A offers $45, B offers $55, poster takes A.
        let mut job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));
        let b = pending_offer(&job, "bob", PaymentTerms::monetary(5500));
        let mut siblings = vec![a.clone(), b.clone()];

        let rejected = accept(&mut job, &mut a, &mut siblings, "poster", Utc::now()).unwrap();

        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.claimed_by_id.as_deref(), Some("alice"));
        assert!(job.claimed_at.is_some());
        assert_eq!(a.status, OfferStatus::Accepted);
        assert_eq!(rejected, vec![b.id]);
        assert_eq!(siblings[0].status, OfferStatus::Pending);
        assert_eq!(siblings[1].status, OfferStatus::Rejected);
        job.check_invariants().unwrap();
    }

    #[test]
    fn only_the_poster_accepts() {
        let mut job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));
        let before = (job.clone(), a.clone());

        let err = accept(&mut job, &mut a, &mut [], "alice", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        assert_eq!((job, a), before);
    }

    #[test]
    fn accept_needs_an_open_job_and_a_pending_offer() {
        let mut job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));
        a.status = OfferStatus::Withdrawn;
        assert!(matches!(
            accept(&mut job, &mut a, &mut [], "poster", Utc::now()).unwrap_err(),
            MarketError::InvalidState { entity: "offer", .. }
        ));

        let mut b = pending_offer(&job, "bob", PaymentTerms::monetary(5500));
        lifecycle::claim(&mut job, "carol", Utc::now()).unwrap();
        assert!(matches!(
            accept(&mut job, &mut b, &mut [], "poster", Utc::now()).unwrap_err(),
            MarketError::InvalidState { entity: "job", .. }
        ));
        assert_eq!(b.status, OfferStatus::Pending);
    }

    #[test]
    fn offer_from_another_job_is_not_found() {
        let mut job = open_job("poster");
        let other = open_job("poster");
        let mut stray = pending_offer(&other, "alice", PaymentTerms::monetary(100));
        assert!(matches!(
            accept(&mut job, &mut stray, &mut [], "poster", Utc::now()).unwrap_err(),
            MarketError::NotFound { entity: "offer", .. }
        ));
    }

    #[test]
    fn monetary_offer_without_amount_fails_validation() {
        let job = open_job("poster");
        let input = NewOffer {
            payment_type: PaymentType::Monetary,
            amount_cents: None,
            in_kind_description: None,
            message: None,
            offered_by_email: None,
        };
        assert!(matches!(
            submit(&job, "alice", input).unwrap_err(),
            MarketError::Validation(_)
        ));
    }

    #[test]
    fn offers_need_an_open_job_from_someone_else() {
        let mut job = open_job("poster");
        assert!(matches!(
            submit(&job, "poster", NewOffer::monetary(4000)).unwrap_err(),
            MarketError::Unauthorized(_)
        ));

        lifecycle::cancel(&mut job, "poster", Utc::now()).unwrap();
        assert!(matches!(
            submit(&job, "alice", NewOffer::monetary(4000)).unwrap_err(),
            MarketError::InvalidState { .. }
        ));
    }

    #[test]
    fn submit_normalizes_terms() {
        let job = open_job("poster");
        let input = NewOffer {
            payment_type: PaymentType::InKind,
            amount_cents: Some(100),
            in_kind_description: Some("  two hours of CAD help ".into()),
            message: Some("   ".into()),
            offered_by_email: Some(" alice@makers.test ".into()),
        };
        let ok = submit(&job, "alice", input).unwrap();
        assert_eq!(ok.amount_cents, None);
        assert_eq!(ok.in_kind_description.as_deref(), Some("two hours of CAD help"));
        assert_eq!(ok.message, None);
        assert_eq!(ok.offered_by_email.as_deref(), Some("alice@makers.test"));
    }

    #[test]
    fn withdraw_is_for_the_proposer_while_pending() {
        let job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));

        assert!(withdraw(&mut a, "poster", Utc::now()).is_err());
        withdraw(&mut a, "alice", Utc::now()).unwrap();
        assert_eq!(a.status, OfferStatus::Withdrawn);

        // immutable from here on
        assert!(matches!(
            withdraw(&mut a, "alice", Utc::now()).unwrap_err(),
            MarketError::InvalidState { status: "WITHDRAWN", .. }
        ));
    }

    #[test]
    fn reject_is_for_the_poster_while_pending() {
        let job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));

        assert!(matches!(
            reject(&job, &mut a, "alice", Utc::now()).unwrap_err(),
            MarketError::Unauthorized(_)
        ));
        reject(&job, &mut a, "poster", Utc::now()).unwrap();
        assert_eq!(a.status, OfferStatus::Rejected);
        assert!(reject(&job, &mut a, "poster", Utc::now()).is_err());
    }

    #[test]
    fn counter_rejects_original_and_addresses_the_proposer() {
        let job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));
        let mut input = NewOffer::monetary(4800);
        input.message = Some("meet me halfway?".into());

        let counter_offer = counter(&job, &mut a, "poster", input, Utc::now()).unwrap();
        assert_eq!(a.status, OfferStatus::Rejected);
        assert_eq!(counter_offer.amount_cents, Some(4800));
        assert_eq!(
            counter_offer.message.as_deref(),
            Some("Counter-offer to alice@makers.test: meet me halfway?")
        );
    }

    #[test]
    fn counter_is_poster_only_and_validates_before_touching_the_original() {
        let job = open_job("poster");
        let mut a = pending_offer(&job, "alice", PaymentTerms::monetary(4500));

        assert!(counter(&job, &mut a, "bob", NewOffer::monetary(4800), Utc::now()).is_err());
        assert!(counter(&job, &mut a, "poster", NewOffer::monetary(0), Utc::now()).is_err());
        assert_eq!(a.status, OfferStatus::Pending);
    }

    fn countered(job: &Job, proposer: &str) -> (Offer, Offer) {
        let mut original = pending_offer(job, proposer, PaymentTerms::monetary(4000));
        let input = counter(job, &mut original, "poster", NewOffer::monetary(4800), Utc::now()).unwrap();
        let mut reply = pending_offer(job, "poster", input.terms());
        reply.message = input.message;
        reply.counter_to_id = Some(original.offered_by_id.clone());
        (original, reply)
    }

    #[test]
    fn poster_cannot_accept_their_own_counter() {
        let mut job = open_job("poster");
        let (_, mut reply) = countered(&job, "alice");
        assert!(matches!(
            accept(&mut job, &mut reply, &mut [], "poster", Utc::now()).unwrap_err(),
            MarketError::Unauthorized(_)
        ));
        assert!(matches!(
            accept(&mut job, &mut reply, &mut [], "bob", Utc::now()).unwrap_err(),
            MarketError::Unauthorized(_)
        ));
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(reply.status, OfferStatus::Pending);
    }

    #[test]
    fn addressee_accepts_a_counter_and_takes_the_job() {
        let mut job = open_job("poster");
        let (original, mut reply) = countered(&job, "alice");
        let bob = pending_offer(&job, "bob", PaymentTerms::monetary(5500));
        let mut siblings = vec![original, bob.clone()];

        let rejected = accept(&mut job, &mut reply, &mut siblings, "alice", Utc::now()).unwrap();

        assert_eq!(reply.status, OfferStatus::Accepted);
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.claimed_by_id.as_deref(), Some("alice"));
        assert_eq!(rejected, vec![bob.id]);
        job.check_invariants().unwrap();
    }

    #[test]
    fn counters_are_rejected_by_the_addressee() {
        let job = open_job("poster");
        let (_, mut reply) = countered(&job, "alice");

        assert!(reject(&job, &mut reply, "poster", Utc::now()).is_err());
        reject(&job, &mut reply, "alice", Utc::now()).unwrap();
        assert_eq!(reply.status, OfferStatus::Rejected);
    }

    #[test]
    fn a_counter_is_not_countered_again() {
        let job = open_job("poster");
        let (_, mut reply) = countered(&job, "alice");
        assert!(matches!(
            counter(&job, &mut reply, "poster", NewOffer::monetary(4900), Utc::now()).unwrap_err(),
            MarketError::Unauthorized(_)
        ));
        assert_eq!(reply.status, OfferStatus::Pending);
    }

    #[test]
    fn an_uncountered_offer_from_the_poster_is_never_taken() {
        let mut job = open_job("poster");
        let mut own = pending_offer(&job, "poster", PaymentTerms::monetary(4800));
        assert!(accept(&mut job, &mut own, &mut [], "poster", Utc::now()).is_err());
        assert_eq!(job.status, JobStatus::Open);
    }
}
