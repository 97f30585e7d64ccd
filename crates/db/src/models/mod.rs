pub mod step_completion;
pub mod talent;
pub mod talent_onboarding;
