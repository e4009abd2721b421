//! Shared application state for the Axum server.

use std::sync::Arc;

use np_agent::Pipeline;
use tokio::sync::Mutex;

/// Shared application state, cheap to clone into handlers.
///
/// The API drives a single configured device, so runs are serialized
/// behind `run_lock`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
