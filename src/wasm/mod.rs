mod consolidation;
mod descriptor;
mod fees;

pub use consolidation::ConsolidationNamespace;
pub use descriptor::DescriptorNamespace;
pub use fees::{FeeNamespace, FeePolicyInput, FeeTargetOutput};

use wasm_bindgen::prelude::*;

/// Package version and the git commit it was built from, e.g. `0.1.0+abc123`
#[wasm_bindgen]
pub fn version() -> String {
    format!(
        "{}+{}",
        env!("WASM_SPENDING_CORE_VERSION"),
        env!("WASM_SPENDING_CORE_GIT_HASH")
    )
}
