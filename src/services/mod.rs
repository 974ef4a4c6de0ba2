pub mod eligibility;
pub mod fulfillment;
pub mod ledger;
pub mod notifier;
pub mod skill;
