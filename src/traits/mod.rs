pub mod class;

pub use class::{ChannelClass, ClassRef, Hooks};
