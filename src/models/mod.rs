pub mod queued_submission;

pub use queued_submission::{FormSubmission, QueuedSubmission, ReplayRequest};
