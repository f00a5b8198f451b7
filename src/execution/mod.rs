// Order execution module
pub mod controller;

pub use controller::{LifecycleController, SymbolState};
