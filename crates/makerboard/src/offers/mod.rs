pub mod model;
pub mod negotiation;
pub mod repo;

pub use model::{NewOffer, Offer, OfferFilter, OfferStatus};
pub use repo::{Acceptance, CounterOffer, OffersRepo};
