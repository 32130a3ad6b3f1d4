pub mod ledger;
pub mod memory;

pub use ledger::{LedgerError, SeatLedger};
pub use memory::MemoryLedger;
