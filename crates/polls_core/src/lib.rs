pub mod domain;
pub mod polls;
pub mod ports;
pub mod visibility;

pub use domain::{AuthSession, Choice, Question, QuestionDetail, QuestionSummary, User, UserCredentials};
pub use polls::{AdminQuestionRow, NewQuestion, PollService, VoteOutcome};
pub use ports::{DatabaseService, PortError, PortResult, QuestionQuery};
pub use visibility::{PublishedFilter, RecencyWindow, INDEX_LIMIT};
