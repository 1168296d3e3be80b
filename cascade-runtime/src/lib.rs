pub mod engine;
pub mod error;
pub mod interpreter;
pub mod resource;
pub mod store;
pub mod value;

pub use engine::{EngineError, RuleSetEngine, SubRuleSet};
pub use error::RuntimeError;
pub use interpreter::{Interpreter, Value, MAX_CALL_DEPTH};
pub use resource::{ResourceHandler, Token};
pub use store::DataStore;
pub use value::ValueMap;
