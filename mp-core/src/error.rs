//! Error types, re-exported from `mp-error`

pub use mp_error::{MenupiError, Result};
