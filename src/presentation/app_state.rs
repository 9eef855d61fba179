// Application state for HTTP handlers
use crate::application::buffer::TelemetryBuffer;

#[derive(Clone)]
pub struct AppState {
    pub buffer: TelemetryBuffer,
}
