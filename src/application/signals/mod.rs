// Per-symbol inference
pub mod analyzer;
pub mod pipeline;
// Pair selection and best-signal ranking
pub mod scanner;
pub mod universe;

pub use analyzer::{AnalyzerSettings, SignalAnalyzer};
pub use pipeline::SignalPipeline;
pub use scanner::{ScanReport, SignalScanner, select_best};
pub use universe::{FALLBACK_PAIRS, PairUniverse};
