pub mod report;
pub mod response;
pub mod ticker;

pub use report::*;
pub use response::*;
pub use ticker::*;
