mod http;
mod local;
mod traits;

pub use http::{HttpProgressRecorder, HttpSessionReporter};
pub use local::DbSessionReporter;
pub use traits::{
    NullProgressRecorder, NullSessionReporter, ProgressRecorder, ProgressUpdate, SessionOutcome,
    SessionReporter,
};
