use std::sync::Arc;

use crate::controller::Controller;

#[derive(Clone)]
pub struct AppState {
    pub controller: Controller,
    pub auth_token: Arc<String>,
}
