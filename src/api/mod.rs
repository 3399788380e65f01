pub mod alerts;
pub mod error;
pub mod handlers;
pub mod routes;

pub use alerts::*;
pub use error::*;
pub use handlers::*;
pub use routes::*;
