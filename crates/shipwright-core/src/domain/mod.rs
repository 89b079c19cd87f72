//! Domain model (ids, requests, stages, outcomes, records, ...).

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod notification;
pub mod outcome;
pub mod repository;
pub mod state;
pub mod task;

pub use attempt::{AttemptOutcome, AttemptRecord, DecisionRecord};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::ErrorKind;
pub use ids::{AttemptId, ParseIdError, SubmissionId};
pub use notification::NotificationPayload;
pub use outcome::{FALLBACK_PAGE, GeneratedDocument, RoundReport};
pub use repository::{Commit, DEFAULT_BRANCH, RemoteFile, Repository};
pub use state::Stage;
pub use task::{
    Attachment, AttachmentError, RequestError, Round, RoundKey, SubmitRequest, TaskId,
    TaskRequest,
};
