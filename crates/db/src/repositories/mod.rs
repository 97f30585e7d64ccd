//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or a transaction connection) as the first argument.

pub mod step_completion_repo;
pub mod talent_onboarding_repo;
pub mod talent_repo;

pub use step_completion_repo::StepCompletionRepo;
pub use talent_onboarding_repo::TalentOnboardingRepo;
pub use talent_repo::TalentRepo;
