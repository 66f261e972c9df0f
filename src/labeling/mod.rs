pub mod generator;
pub mod simulator;
pub mod stats;

pub use generator::{GenerationObserver, GenerationOutput, LabelGenerator, NoopObserver, SymbolSkip};
pub use simulator::{BarrierSimulator, TradeOutcome};
pub use stats::LabelStats;
