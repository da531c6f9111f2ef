use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::hashing::fnv1a_hash;
use crate::backend::spec::{Operand, Program, ProgramSerdeError, TensorSpec, ValueId};
use crate::config::RuntimeConfig;
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::OnnxNode;
use crate::ops::OpRegistry;
use crate::tensor::{Tensor, Value};

const MAGIC: &[u8; 8] = b"ONNXRSEX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4 + 8;

/// Serialized, reloadable traced computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exported {
    pub function_name: String,
    pub in_avals: Vec<TensorSpec>,
    pub out_avals: Vec<TensorSpec>,
    pub platforms: Vec<String>,
    pub nr_devices: usize,
    pub opset_imports: BTreeMap<String, u32>,
    pub module: Program,
}

impl Exported {
    /// Layout: magic, `u32` format version, `u64` payload length, bincode payload, `u64`
    /// FNV-1a checksum of the payload. Integers are little endian.
    pub fn serialize(&self) -> OnnxResult<Vec<u8>> {
        let payload = bincode::serialize(self).map_err(ProgramSerdeError::from)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + 8);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&fnv1a_hash(&payload).to_le_bytes());
        Ok(bytes)
    }

    pub fn deserialize(bytes: &[u8]) -> OnnxResult<Self> {
        let header_err = |msg: String| OnnxError::from(ProgramSerdeError::Header(msg));
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(header_err("missing exported artifact magic".into()));
        }
        let version = read_u32(&bytes[MAGIC.len()..]);
        if version != FORMAT_VERSION {
            return Err(header_err(format!(
                "unsupported artifact format version {version}"
            )));
        }
        let payload_len = read_u64(&bytes[MAGIC.len() + 4..]) as usize;
        let payload_end = HEADER_LEN
            .checked_add(payload_len)
            .filter(|end| end.checked_add(8) == Some(bytes.len()))
            .ok_or_else(|| {
                header_err(format!(
                    "payload length {payload_len} does not match artifact size {}",
                    bytes.len()
                ))
            })?;
        let payload = &bytes[HEADER_LEN..payload_end];
        if read_u64(&bytes[payload_end..]) != fnv1a_hash(payload) {
            return Err(header_err("artifact checksum mismatch".into()));
        }
        let exported: Exported = bincode::deserialize(payload).map_err(ProgramSerdeError::from)?;
        exported.module.validate_version()?;
        exported.module.validate_literals()?;
        Ok(exported)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> OnnxResult<()> {
        let path = path.as_ref();
        let bytes = self.serialize()?;
        fs::write(path, &bytes)?;
        tracing::info!(
            function = %self.function_name,
            path = %path.display(),
            bytes = bytes.len(),
            "saved exported artifact"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> OnnxResult<Self> {
        let path = path.as_ref();
        let exported = Self::deserialize(&fs::read(path)?)?;
        tracing::info!(
            function = %exported.function_name,
            path = %path.display(),
            "loaded exported artifact"
        );
        Ok(exported)
    }

    pub fn to_json_string(&self) -> OnnxResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(ProgramSerdeError::from)
            .map_err(OnnxError::from)
    }

    pub fn from_json_str(src: &str) -> OnnxResult<Self> {
        let exported: Exported = serde_json::from_str(src).map_err(ProgramSerdeError::from)?;
        exported.module.validate_version()?;
        exported.module.validate_literals()?;
        Ok(exported)
    }

    /// Runs the traced program on `inputs` on the configured platform.
    pub fn call(&self, registry: &OpRegistry, inputs: &[Tensor]) -> OnnxResult<Vec<Tensor>> {
        self.call_on(registry, &RuntimeConfig::global().platform, inputs)
    }

    /// Runs the traced program as if executing on `platform`.
    pub fn call_on(
        &self,
        registry: &OpRegistry,
        platform: &str,
        inputs: &[Tensor],
    ) -> OnnxResult<Vec<Tensor>> {
        self.check_signature(platform, inputs)?;

        let mut env: HashMap<ValueId, Tensor> = self
            .module
            .parameter_ids
            .iter()
            .copied()
            .zip(inputs.iter().cloned())
            .collect();

        for instruction in &self.module.body {
            let args = instruction
                .operands
                .iter()
                .map(|operand| self.resolve_operand(&env, operand))
                .collect::<OnnxResult<Vec<Value>>>()?;
            let mut node = OnnxNode::new(instruction.op_type.clone(), instruction.opset_version);
            node.domain = instruction.domain.clone();
            node.attrs = instruction.attrs.clone();
            let outputs = registry.run(&mut node, &args)?;
            if outputs.len() != instruction.outputs.len() {
                return Err(self.mismatch(format!(
                    "{} produced {} outputs, artifact expects {}",
                    instruction.op_type,
                    outputs.len(),
                    instruction.outputs.len()
                )));
            }
            for (index, (output, recorded)) in outputs.iter().zip(&instruction.output_types).enumerate() {
                let actual = output.spec();
                if &actual != recorded {
                    return Err(self.mismatch(format!(
                        "{} output {index}: artifact records {recorded}, registry produced {actual}",
                        instruction.op_type
                    )));
                }
            }
            env.extend(instruction.outputs.iter().copied().zip(outputs));
        }

        let results = self
            .module
            .result_ids
            .iter()
            .map(|id| {
                env.get(id)
                    .cloned()
                    .ok_or_else(|| self.mismatch(format!("result %{} was never produced", id.0)))
            })
            .collect::<OnnxResult<Vec<Tensor>>>()?;
        if results.len() != self.out_avals.len() {
            return Err(self.mismatch(format!(
                "program returns {} results, artifact declares {}",
                results.len(),
                self.out_avals.len()
            )));
        }
        for (index, (result, expected)) in results.iter().zip(&self.out_avals).enumerate() {
            let actual = result.spec();
            if &actual != expected {
                return Err(self.mismatch(format!(
                    "result {index}: expected {expected}, got {actual}"
                )));
            }
        }
        Ok(results)
    }

    fn check_signature(&self, platform: &str, inputs: &[Tensor]) -> OnnxResult<()> {
        if !self.platforms.iter().any(|p| p.eq_ignore_ascii_case(platform)) {
            return Err(self.mismatch(format!(
                "platform '{platform}' is not among exported platforms {:?}",
                self.platforms
            )));
        }
        if inputs.len() != self.in_avals.len() {
            return Err(self.mismatch(format!(
                "expected {} inputs, got {}",
                self.in_avals.len(),
                inputs.len()
            )));
        }
        for (index, (input, expected)) in inputs.iter().zip(&self.in_avals).enumerate() {
            let actual = input.spec();
            if &actual != expected {
                return Err(self.mismatch(format!("input {index}: expected {expected}, got {actual}")));
            }
        }
        Ok(())
    }

    fn resolve_operand(&self, env: &HashMap<ValueId, Tensor>, operand: &Operand) -> OnnxResult<Value> {
        match operand {
            Operand::Value(id) => env
                .get(id)
                .cloned()
                .map(Value::Tensor)
                .ok_or_else(|| self.mismatch(format!("value %{} used before definition", id.0))),
            Operand::Absent => Ok(Value::None),
            Operand::Literal(literal) => Tensor::from_literal(literal).map(Value::Tensor),
        }
    }

    fn mismatch(&self, detail: String) -> OnnxError {
        OnnxError::signature_mismatch(self.function_name.clone(), detail)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
