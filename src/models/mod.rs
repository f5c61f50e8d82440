pub mod query;
pub mod filters;
pub mod results;

pub use query::*;
pub use filters::*;
pub use results::*;
