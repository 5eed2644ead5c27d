pub mod performance;
pub mod price;
pub mod regime;
pub mod signals;

pub use performance::*;
pub use price::*;
pub use regime::*;
pub use signals::*;
