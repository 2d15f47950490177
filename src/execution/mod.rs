pub mod dispatcher;
pub mod executor;

pub use dispatcher::{
    ActionDispatcher, DispatchContext, DispatchReceipt, DispatcherRegistry, SimulatedDispatcher,
};
pub use executor::{Executor, MAX_ATTEMPTS};
