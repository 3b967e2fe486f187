pub mod block;
pub mod cfg;
pub mod error;
pub mod function;
pub mod id;
pub mod instruction;
pub mod module;
pub mod ops;
pub mod type_id;
pub mod types;

// Re-export commonly used types
pub use block::{BasicBlock, NumberEnv, ValueNumber, ValueTable};
pub use cfg::Cfg;
pub use error::CoreError;
pub use function::{Function, Param};
pub use id::BlockId;
pub use instruction::{Arg, Instruction, Literal, Token};
pub use module::Module;
pub use ops::Op;
pub use type_id::{TypeId, TypeRegistry};
pub use types::{literal_bit_width, LmType, ScalarKind};
