use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

use crate::onnx::attribute::Attributes;
use crate::tensor::{DType, Shape};

/// Frozen program format version enforced when artifacts are reloaded.
pub const SPEC_VERSION: &str = "onnxrs.program.v1";

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: impl Into<Shape>) -> Self {
        Self {
            dtype,
            shape: shape.into(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.shape.num_elements()
    }

    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.size_in_bytes()
    }

    /// Payload size in bytes, or `None` when the shape cannot be materialized.
    pub fn checked_byte_len(&self) -> Option<usize> {
        self.shape
            .checked_num_elements()?
            .checked_mul(self.dtype.size_in_bytes())
            .filter(|&bytes| bytes <= isize::MAX as usize)
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{:?} x {}>", self.dtype, format_shape(&self.shape))
    }
}

/// Dense literal tensor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLiteral {
    pub spec: TensorSpec,
    pub bytes: Arc<[u8]>,
}

impl TensorLiteral {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Self {
        Self { spec, bytes }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl Serialize for TensorLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorLiteral", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorLiteralHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorLiteralHelper::deserialize(deserializer)?;
        Ok(TensorLiteral {
            spec: helper.spec,
            bytes: Arc::<[u8]>::from(helper.bytes),
        })
    }
}

/// Unique identifier for SSA values in a traced program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Operand reference in an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    /// Omitted optional operator input.
    Absent,
    /// Constant captured while tracing.
    Literal(TensorLiteral),
}

/// Single ONNX operator invocation recorded during tracing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op_type: String,
    #[serde(default)]
    pub domain: String,
    pub opset_version: u32,
    pub attrs: Attributes,
    pub operands: Vec<Operand>,
    pub outputs: Vec<ValueId>,
    pub output_types: Vec<TensorSpec>,
}

/// Straight-line traced computation with typed parameters and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    pub name: String,
    pub parameters: Vec<TensorSpec>,
    pub parameter_ids: Vec<ValueId>,
    pub body: Vec<Instruction>,
    pub results: Vec<TensorSpec>,
    pub result_ids: Vec<ValueId>,
}

#[derive(Debug, Error)]
pub enum ProgramSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("program spec version '{found}' does not match expected '{expected}'")]
    SpecVersionMismatch {
        found: String,
        expected: &'static str,
    },
    #[error("invalid artifact header: {0}")]
    Header(String),
    #[error("invalid literal operand: {0}")]
    Literal(String),
}

impl Program {
    /// Checks the stored format version after deserialization.
    pub fn validate_version(&self) -> Result<(), ProgramSerdeError> {
        normalize_spec_version(self.spec_version.clone()).map(|_| ())
    }

    /// Checks that every literal operand's payload matches its declared signature.
    pub fn validate_literals(&self) -> Result<(), ProgramSerdeError> {
        for instruction in &self.body {
            for operand in &instruction.operands {
                let Operand::Literal(literal) = operand else {
                    continue;
                };
                let expected = literal.spec.checked_byte_len().ok_or_else(|| {
                    ProgramSerdeError::Literal(format!(
                        "{} literal shape {} overflows",
                        instruction.op_type, literal.spec
                    ))
                })?;
                if expected != literal.byte_len() {
                    return Err(ProgramSerdeError::Literal(format!(
                        "{} literal holds {} bytes, {} declares {expected}",
                        instruction.op_type,
                        literal.byte_len(),
                        literal.spec
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        format!("{self}")
    }
}

fn normalize_spec_version(version: String) -> Result<String, ProgramSerdeError> {
    if version.is_empty() {
        return Ok(SPEC_VERSION.to_string());
    }
    if version == SPEC_VERSION {
        Ok(version)
    } else {
        Err(ProgramSerdeError::SpecVersionMismatch {
            found: version,
            expected: SPEC_VERSION,
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(
            f,
            0,
            &format!(
                "program @{} (spec_version = {}) {{",
                self.name, self.spec_version
            ),
        )?;
        if !self.parameter_ids.is_empty() {
            write_line(f, 1, "params:")?;
            for (value_id, spec) in self.parameter_ids.iter().zip(self.parameters.iter()) {
                write_line(f, 2, &format!("%{} : {}", value_id.0, spec))?;
            }
        }
        if !self.body.is_empty() {
            write_line(f, 1, "body:")?;
            for instruction in &self.body {
                fmt_instruction(instruction, 2, f)?;
            }
        }
        if !self.result_ids.is_empty() {
            write_line(f, 1, "results:")?;
            for (value_id, spec) in self.result_ids.iter().zip(self.results.iter()) {
                write_line(f, 2, &format!("%{} : {}", value_id.0, spec))?;
            }
        }
        write_line(f, 0, "}")
    }
}

fn fmt_instruction(
    instruction: &Instruction,
    indent: usize,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let outputs = instruction
        .outputs
        .iter()
        .map(|id| format!("%{}", id.0))
        .collect::<Vec<_>>()
        .join(", ");
    let operands = instruction
        .operands
        .iter()
        .map(format_operand)
        .collect::<Vec<_>>()
        .join(", ");
    let types = instruction
        .output_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let attrs = if instruction.attrs.is_empty() {
        String::new()
    } else {
        let inner = instruction
            .attrs
            .iter()
            .map(|(key, value)| format!("{key} = {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" {{{inner}}}")
    };
    write_line(
        f,
        indent,
        &format!(
            "{outputs} = {}.v{}({operands}){attrs} -> {types}",
            instruction.op_type, instruction.opset_version
        ),
    )
}

fn format_shape(shape: &Shape) -> String {
    if shape.dims().is_empty() {
        "[]".to_string()
    } else {
        shape
            .dims()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("x")
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(id) => format!("%{}", id.0),
        Operand::Absent => "_".to_string(),
        Operand::Literal(lit) => format!(
            "literal(dtype={:?}, shape={})",
            lit.spec.dtype,
            format_shape(&lit.spec.shape)
        ),
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}

/// Lightweight builder for constructing programs instruction by instruction.
#[derive(Default)]
pub struct ProgramBuilder {
    next_value_id: u32,
    parameters: Vec<(ValueId, TensorSpec)>,
    instructions: Vec<Instruction>,
    value_types: HashMap<ValueId, TensorSpec>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, spec: TensorSpec) -> ValueId {
        let id = self.fresh_id();
        self.value_types.insert(id, spec.clone());
        self.parameters.push((id, spec));
        id
    }

    /// Appends an instruction and allocates one value id per output type.
    pub fn emit(
        &mut self,
        op_type: impl Into<String>,
        opset_version: u32,
        attrs: Attributes,
        operands: Vec<Operand>,
        output_types: Vec<TensorSpec>,
    ) -> Vec<ValueId> {
        let outputs = output_types
            .iter()
            .map(|spec| {
                let id = self.fresh_id();
                self.value_types.insert(id, spec.clone());
                id
            })
            .collect::<Vec<_>>();
        self.instructions.push(Instruction {
            op_type: op_type.into(),
            domain: String::new(),
            opset_version,
            attrs,
            operands,
            outputs: outputs.clone(),
            output_types,
        });
        outputs
    }

    /// Seals the program. Returns `None` if a result id was never produced.
    pub fn finish(self, name: impl Into<String>, result_ids: Vec<ValueId>) -> Option<Program> {
        let mut results = Vec::with_capacity(result_ids.len());
        for id in &result_ids {
            results.push(self.value_types.get(id)?.clone());
        }
        let (parameter_ids, parameters): (Vec<_>, Vec<_>) = self.parameters.into_iter().unzip();
        Some(Program {
            spec_version: SPEC_VERSION.to_string(),
            name: name.into(),
            parameters,
            parameter_ids,
            body: self.instructions,
            results,
            result_ids,
        })
    }

    fn fresh_id(&mut self) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        id
    }
}

/// Opset imports referenced by a program body, highest version per domain.
pub fn opset_imports(program: &Program) -> BTreeMap<String, u32> {
    let mut imports = BTreeMap::new();
    for instruction in &program.body {
        let entry = imports.entry(instruction.domain.clone()).or_insert(0);
        *entry = (*entry).max(instruction.opset_version);
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onnx::AttrValue;

    fn sample_program() -> Program {
        let mut builder = ProgramBuilder::new();
        let spec = TensorSpec::new(DType::F32, [2, 3]);
        let x = builder.add_parameter(spec.clone());
        let mut attrs = Attributes::new();
        attrs.insert("keepdims".into(), AttrValue::Int(0));
        let y = builder.emit("Sin", 7, Attributes::new(), vec![Operand::Value(x)], vec![spec]);
        let z = builder.emit(
            "ReduceSum",
            13,
            attrs,
            vec![Operand::Value(y[0]), Operand::Absent],
            vec![TensorSpec::new(DType::F32, Vec::<usize>::new())],
        );
        builder.finish("main", z).expect("results are defined")
    }

    #[test]
    fn program_survives_json_and_bincode() {
        let program = sample_program();
        let json = serde_json::to_string(&program).expect("json");
        let parsed: Program = serde_json::from_str(&json).expect("parse json");
        assert_eq!(parsed, program);
        let bytes = bincode::serialize(&program).expect("bincode");
        let parsed: Program = bincode::deserialize(&bytes).expect("parse bincode");
        assert_eq!(parsed, program);
    }

    #[test]
    fn literal_payloads_must_match_their_shape() {
        let mut program = sample_program();
        let literal = TensorLiteral::new(TensorSpec::new(DType::F32, [2]), Arc::from(vec![0u8; 8]));
        program.body[1].operands[1] = Operand::Literal(literal.clone());
        assert!(program.validate_literals().is_ok());

        let mut short = literal.clone();
        short.spec = TensorSpec::new(DType::F32, [3]);
        program.body[1].operands[1] = Operand::Literal(short);
        assert!(matches!(
            program.validate_literals(),
            Err(ProgramSerdeError::Literal(_))
        ));

        let mut huge = literal;
        huge.spec = TensorSpec::new(DType::F32, [1usize << 32, 1 << 32, 16]);
        assert_eq!(huge.spec.checked_byte_len(), None);
        program.body[1].operands[1] = Operand::Literal(huge);
        assert!(matches!(
            program.validate_literals(),
            Err(ProgramSerdeError::Literal(_))
        ));
    }

    #[test]
    fn foreign_spec_version_is_rejected() {
        let mut program = sample_program();
        program.spec_version = "onnxrs.program.v0".into();
        assert!(matches!(
            program.validate_version(),
            Err(ProgramSerdeError::SpecVersionMismatch { .. })
        ));
    }

    #[test]
    fn opset_imports_take_the_highest_version() {
        let imports = opset_imports(&sample_program());
        assert_eq!(imports.get(""), Some(&13));
        assert_eq!(imports.len(), 1);
    }

    #[test]
    fn finish_rejects_unknown_result_ids() {
        let builder = ProgramBuilder::new();
        assert!(builder.finish("main", vec![ValueId(4)]).is_none());
    }

    #[test]
    fn text_dump_lists_instructions() {
        let text = sample_program().to_text();
        assert!(text.contains("Sin.v7"));
        assert!(text.contains("ReduceSum.v13"));
    }
}
