pub mod budget;
pub mod date;
pub mod loaders;
pub mod outcome;
pub mod presets;
pub mod record;
pub mod stats;
pub mod wizard;

pub use budget::{ChallengeBudgets, RetryBudget};
pub use date::date_candidates;
pub use loaders::{load_wizard_table, parse_wizard_table};
pub use outcome::{BlockReason, Extracted, ModalKind, PageOutcome, RowResult};
pub use presets::{preset, Payer, Workflow};
pub use record::{clean_code, IdentityRule, InputRecord};
pub use stats::RunStats;
pub use wizard::{
    Action, ChallengeSpec, Extraction, FieldSource, Marker, ModalSpec, PageSpec, Pattern,
    SheetLayout, WizardTable,
};
