//! Graph-side data model: nodes and their attributes.

pub mod attribute;
mod node;

pub use attribute::{AttrValue, Attributes, AttrsDict, AttrsDictExt, Param, ParamDefault, ParamSchema};
pub use node::OnnxNode;
