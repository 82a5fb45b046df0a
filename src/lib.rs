pub mod args;
pub mod cluster;
pub mod config;
pub mod data;
pub mod evaluation;
pub mod layers;
pub mod libsvm;
pub mod network;
pub mod optimizers;
pub mod session;
pub mod sparse;
pub mod tensor;
pub mod test_utils;
pub mod training;

pub use args::{parse_arguments, Args, RunArgs};
pub use cluster::{ClusterError, ClusterSpec, JobName, TaskSpec};
pub use config::{ConfigError, TrainingConfig};
pub use data::{load_lines, shard, BatchReader, DataError};
pub use evaluation::{calculate_loss, calculate_number_of_correct_outputs, evaluate_dataset};
pub use layers::{
    Dense,
    DenseBackwardContext,
    DenseForwardContext,
    //
    Dropout,
    DropoutBackwardContext,
    DropoutForwardContext,
    //
    Layer,
    LayerBackwardContext,
    LayerForwardContext,
    //
    LeakyReLU,
    LeakyReLUBackwardContext,
    LeakyReLUForwardContext,
    //
    SparseDense,
    SparseDenseBackwardContext,
};
pub use libsvm::{
    one_hot_for_label, parse_batch, parse_line, BatchError, LibsvmBatch, ParsedRecord,
    RecordError, NEGATIVE_LABEL, POSITIVE_LABEL,
};
pub use network::{Network, NUM_CLASSES};
pub use optimizers::{Adadelta, Adagrad, Adam, Ftrl, Momentum, Optimizer, OptimizerKind, RMSProp, SGD};
pub use session::{LocalSession, Session, SessionError, StepOutput, StopHandle};
pub use sparse::{SparseError, SparseTensor};
pub use tensor::Tensor;
pub use training::{run_training, TrainingError, TrainingStats};
