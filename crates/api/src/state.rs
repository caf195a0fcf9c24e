//! Shared application state for the HTTP layer.

use std::sync::Arc;

use postbridge_core::{ConnectionService, TokenRotationManager};

#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionService>,
    pub rotation: Arc<TokenRotationManager>,
}

impl AppState {
    pub fn new(connections: Arc<ConnectionService>, rotation: Arc<TokenRotationManager>) -> Self {
        Self { connections, rotation }
    }
}
