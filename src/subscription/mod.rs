pub mod catalog;
pub mod gate;
pub mod period;
pub mod records;
pub mod state;
pub mod tier;

pub use catalog::{Feature, Resource, UNLIMITED};
pub use gate::{FeatureDecision, GateDecision};
pub use records::{SubscriptionData, UsageData};
pub use tier::{BillingCycle, CurrencyCode, SubscriptionStatus, Tier};
