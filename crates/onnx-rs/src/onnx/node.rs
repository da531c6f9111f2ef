use serde::{Deserialize, Serialize};

use super::attribute::{AttrValue, Attributes, AttrsDict};

/// One operator occurrence in a graph.
///
/// `attrs` holds what the model declared and is not touched by dispatch. `attrs_dict` is
/// rebuilt by the attribute adapter every time the node is dispatched and holds exactly
/// the keyword parameters of the selected implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxNode {
    pub name: String,
    pub op_type: String,
    #[serde(default)]
    pub domain: String,
    pub opset_version: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attrs: Attributes,
    #[serde(skip)]
    pub attrs_dict: AttrsDict,
}

impl OnnxNode {
    pub fn new(op_type: impl Into<String>, opset_version: u32) -> Self {
        let op_type = op_type.into();
        Self {
            name: op_type.clone(),
            op_type,
            domain: String::new(),
            opset_version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: Attributes::new(),
            attrs_dict: AttrsDict::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }
}
