pub mod approval;
pub mod gate;

pub use approval::{ApprovalBroker, ApprovalNotifier, ApprovalRequest, LoggingApprovalNotifier};
pub use gate::requires_human_review;
