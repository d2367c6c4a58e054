pub(crate) mod list;
pub(crate) mod search;
pub(crate) mod show;
pub(crate) mod stats;
