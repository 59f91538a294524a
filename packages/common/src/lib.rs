pub mod config;
pub mod loader;
pub mod side;
pub mod storage;

pub use loader::LoaderKind;
pub use side::Side;
