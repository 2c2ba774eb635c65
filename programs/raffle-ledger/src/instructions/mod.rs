//! One handler per ledger operation. Writers take a `LedgerSession`;
//! verifiers take a committed `Tables` snapshot.

pub mod allocate_prize;
pub mod append_entry;
pub mod audit_report;
pub mod check_instant_win;
pub mod claim_instant_win;
pub mod claim_prize;
pub mod commit_seed;
pub mod competition_status;
pub mod draw_results;
pub mod draw_status;
pub mod execute_draw;
pub mod generate_instant_wins;
pub mod publish_checkpoint;
pub mod record_ticket;
pub mod reveal_seed;
pub mod verify_chain;
pub mod verify_checkpoint;
pub mod verify_range;
pub mod verify_ticket;

pub use allocate_prize::*;
pub use append_entry::*;
pub use audit_report::*;
pub use check_instant_win::*;
pub use claim_instant_win::*;
pub use claim_prize::*;
pub use commit_seed::*;
pub use competition_status::*;
pub use draw_results::*;
pub use draw_status::*;
pub use execute_draw::*;
pub use generate_instant_wins::*;
pub use publish_checkpoint::*;
pub use record_ticket::*;
pub use reveal_seed::*;
pub use verify_chain::*;
pub use verify_checkpoint::*;
pub use verify_range::*;
pub use verify_ticket::*;
