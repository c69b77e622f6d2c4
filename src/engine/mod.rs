pub mod command;
pub mod marker;
pub mod mock;
pub mod ocr;
pub mod process;
pub mod registry;
pub mod text;
pub mod types;

pub use registry::Registry;
pub use types::{ConversionResult, ConvertRequest, DepCheck};

pub const FAST_ENGINE: &str = "fast";
pub const HEAVY_ENGINE: &str = "marker";

/// A named conversion capability.
///
/// `convert` never panics or returns `Err` to the caller: every failure,
/// including a missing tool, is a `ConversionResult` with `ok = false`.
pub trait Engine {
    fn name(&self) -> &str;
    fn convert(&self, req: &ConvertRequest) -> ConversionResult;
    fn doctor(&self) -> DepCheck;
}
