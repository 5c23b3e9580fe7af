use wasm_bindgen::prelude::*;

/// Error type for the WASM boundary.
///
/// Core modules return their own typed errors; this type only carries the rendered
/// message across to JavaScript.
#[derive(Debug, Clone)]
pub struct WasmSpendingError {
    message: String,
}

impl WasmSpendingError {
    pub fn new(message: &str) -> Self {
        WasmSpendingError {
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for WasmSpendingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WasmSpendingError {}

impl From<WasmSpendingError> for JsValue {
    fn from(err: WasmSpendingError) -> JsValue {
        js_sys::Error::new(&err.message).into()
    }
}

impl From<crate::descriptor::DescriptorError> for WasmSpendingError {
    fn from(err: crate::descriptor::DescriptorError) -> Self {
        WasmSpendingError::new(&format!("Descriptor error: {}", err))
    }
}

impl From<crate::keybox::ConsolidationError> for WasmSpendingError {
    fn from(err: crate::keybox::ConsolidationError) -> Self {
        WasmSpendingError::new(&format!("Consolidation error: {}", err))
    }
}

impl From<crate::fees::FeeRateError> for WasmSpendingError {
    fn from(err: crate::fees::FeeRateError) -> Self {
        WasmSpendingError::new(&format!("Fee error: {}", err))
    }
}

impl From<serde_wasm_bindgen::Error> for WasmSpendingError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        WasmSpendingError::new(&format!("Invalid JS value: {}", err))
    }
}
