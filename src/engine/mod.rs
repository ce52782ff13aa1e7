pub mod auto_confirm;
pub mod eligibility;
pub mod intake;
pub mod tracking;
pub mod transitions;
pub mod workflow;
