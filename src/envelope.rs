//! Business-level response envelope.
//!
//! Many APIs wrap every payload as `{"code": 0, "msg": "...", "data": ...}`
//! where a non-zero `code` signals an application error even on HTTP 200.
//!
//! ```
//! use profile_http::envelope::ApiEnvelope;
//!
//! let ok: ApiEnvelope<u32> = serde_json::from_str(r#"{"code":0,"msg":"","data":7}"#).unwrap();
//! assert_eq!(ok.into_data().unwrap(), Some(7));
//!
//! let failed: ApiEnvelope<u32> = serde_json::from_str(r#"{"code":401,"msg":"expired"}"#).unwrap();
//! assert!(failed.into_data().is_err());
//! ```

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

fn missing_code() -> i64 {
    -1
}

/// `{code, msg, data}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Business code; `0` means success
    #[serde(default = "missing_code")]
    pub code: i64,
    /// Human-readable message
    #[serde(default, alias = "message")]
    pub msg: String,
    /// Payload
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Whether the business code signals success.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Payload, or [`ClientError::Api`] when the code is non-zero.
    pub fn into_data(self) -> Result<Option<T>> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(ClientError::Api {
                code: self.code,
                message: self.msg,
            })
        }
    }
}
