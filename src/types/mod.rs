pub mod boq;
pub mod element;
pub mod error;
pub mod utils;

pub use boq::{BoqRow, BoqTable, IndicatorCell, NOT_MATCHED, QuantitySource};
pub use element::{
    BoundingBox, ElementMetadata, ElementRecord, GeometryData, MaterialEntry, MaterialKind,
    MaterialLayer, PropertySets,
};
pub use error::{ErrorCategory, ErrorClassifier, LcaError, LlmError, Result, ResultExt};
pub use utils::{lenient_f64, round_to, round4};
