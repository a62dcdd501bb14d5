//! Billing: the Stripe REST client used by the checkout flow and the
//! reconciler that maps gateway lifecycle events onto subscription state.

pub mod events;
pub mod reconciler;
pub mod stripe_client;
