pub mod ai;
pub mod history;
pub mod modernization;
