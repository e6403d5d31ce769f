pub mod back_navigation;
pub mod challenge;
pub mod page_step;
pub mod record_book;
pub mod run_log;

pub use back_navigation::{BackNavigator, BackTrack};
pub use challenge::ChallengeHandler;
pub use page_step::{dismiss_modal, PageStep};
pub use record_book::{CellMark, RecordBook, RecordSink};
pub use run_log::RunLog;
