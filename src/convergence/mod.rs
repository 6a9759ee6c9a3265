pub mod normalize;
pub mod reader;
