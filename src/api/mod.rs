// Route handlers, one module per surface. Everything answers inside the
// same ApiResponse envelope.
use serde::Serialize;

pub mod push;
pub mod records;
pub mod tasks;
pub mod upload;

pub use push::*;
pub use records::*;
pub use tasks::*;
pub use upload::*;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}
