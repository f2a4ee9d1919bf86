//! Auxiliary per-evaluation stacks.

mod function_mocks;
mod ref_stack;

pub use function_mocks::FunctionMocksStack;
pub use ref_stack::RefStack;
