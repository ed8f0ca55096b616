pub mod credential;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod loaders;
pub mod outcome;
pub mod record;
pub mod session;
pub mod target;

pub use credential::Credential;
pub use loaders::{load_targets, parse_targets, select_targets};
pub use outcome::{JobReport, Phase, ReportError, RunOutcome};
pub use record::{Provenance, Record, RecordKind};
pub use session::Session;
pub use target::{
    ApiPagination, ChallengeConfig, FieldRule, LoginConfig, LoginFlow, Navigation, NavigationMode,
    TargetDescriptor, TreePagination,
};
