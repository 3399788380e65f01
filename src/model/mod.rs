pub mod application;
pub mod common;
pub mod instance;
pub mod wmis_component;

pub use application::*;
pub use common::{Entity, Id};
pub use instance::*;
pub use wmis_component::*;
