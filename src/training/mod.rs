pub mod baseline;
pub mod trainer;

pub use baseline::BaselineTrainer;
pub use trainer::{
    DirectionReport, EvalMetrics, ModelMetadata, ModelTrainer, NoopTrainingObserver,
    TrainingObserver, TrainingReport,
};
