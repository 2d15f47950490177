pub mod assessment;
pub mod incident;
pub mod plan;
pub mod record;

pub use assessment::*;
pub use incident::*;
pub use plan::*;
pub use record::*;
