mod monitoring_error;
mod paperflow_error;
mod pipeline_error;
mod review_error;
mod storage_error;
mod workflow_error;

pub use monitoring_error::MonitoringError;
pub use paperflow_error::{PaperflowError, PaperflowResult};
pub use pipeline_error::PipelineError;
pub use review_error::ReviewError;
pub use storage_error::StorageError;
pub use workflow_error::WorkflowError;
