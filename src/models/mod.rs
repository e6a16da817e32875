pub mod analysis;
pub mod role;
pub mod status;

pub use analysis::{ItemAnalysis, TaskStatus};
pub use role::Role;
pub use status::RequestStatus;
