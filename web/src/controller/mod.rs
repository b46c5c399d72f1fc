use serde::Serialize;

pub(crate) mod call_controller;
pub(crate) mod health_check_controller;
pub(crate) mod sync_controller;
pub(crate) mod webhook_controller;

/// The `{ success: true, ...payload }` envelope every successful response uses.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    payload: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}
