pub(crate) mod analyze;
pub(crate) mod explain;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod run;
pub(crate) mod shared;
pub(crate) mod sync;
