pub mod analysis;

pub use analysis::{AnalysisKind, AnalysisRecord, AnalysisStatus, AnalysisUpdate, NewAnalysis};
