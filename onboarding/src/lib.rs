pub mod backend;
pub mod capture;
pub mod chain;
pub mod config;
pub mod countries;
pub mod error;
pub mod guard;
pub mod liveness;
pub mod logger;
pub mod oracle;
pub mod personal;
pub mod workflow;

pub use workflow::{Collaborators, OnboardingController, WorkflowEvent, WorkflowStage};
