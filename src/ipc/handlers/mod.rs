pub mod backup;
pub mod core;
pub mod ledger;
pub mod monitoring;
pub mod navigation;
pub mod policy;
pub mod review;
pub mod roster;
pub mod submissions;
