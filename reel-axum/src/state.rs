use std::sync::Arc;

use reel_blob::UploadCoordinator;

#[derive(Clone)]
pub struct ReelAxumState {
    pub coordinator: Arc<dyn UploadCoordinator>,
    /// Bearer token every protected route requires, when set
    pub auth_token: Option<Arc<str>>,
}

impl ReelAxumState {
    pub fn new(coordinator: Arc<dyn UploadCoordinator>) -> Self {
        Self {
            coordinator,
            auth_token: None,
        }
    }

    pub fn with_auth_token<S: AsRef<str>>(mut self, token: Option<S>) -> Self {
        self.auth_token = token
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        self
    }
}
