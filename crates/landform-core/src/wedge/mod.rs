pub mod assembler;
pub mod filter;
pub mod frame;
pub mod observation;
pub mod reconstruct;

pub use assembler::{assemble_wedge, GeometryPreference, SelectionRequirements, WedgeSelection};
pub use filter::classify;
pub use frame::{Frame, FrameTransform, TransformSource};
pub use observation::{FilterReject, Geometry, Observation, ObservationType};
pub use reconstruct::{NormalScale, ReconstructionMethod, ReconstructionParams};
