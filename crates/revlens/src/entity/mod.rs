//! SeaORM entity definitions for the revlens database schema.

pub mod analysis_result;
pub mod category;
pub mod change;
pub mod change_status;
pub mod prelude;
pub mod sync_cursor;
