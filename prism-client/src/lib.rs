mod auth;
pub mod backend;
pub mod calendar;
mod client;
mod dev_backend;
pub mod domain;
mod envelope;
mod error;
mod session;
pub mod session_store;
pub mod ticker;
pub mod token;
pub mod workflow;

pub use auth::*;
pub use backend::{AuthBackend, DiaryBackend, StatsBackend};
pub use calendar::{Calendar, CalendarAction, SharedCalendar};
pub use client::*;
pub use dev_backend::DevBackend;
pub use envelope::ApiEnvelope;
pub use error::*;
pub use session::*;
pub use session_store::{FileSessionStore, MemorySessionStore, SessionError, SessionStore};
pub use workflow::{DiaryWorkflow, WorkflowError, WorkflowState};
