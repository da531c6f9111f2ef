use anyhow::Result;
use onnx_rs::export::Exported;

/// Persists `exported` to a scratch file and loads it back.
pub fn save_and_load_exported(exported: &Exported) -> Result<Exported> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(format!("{}.onnxrs", exported.function_name));
    exported.save(&path)?;
    Ok(Exported::load(&path)?)
}

/// Field-by-field equality of two artifacts, reporting the first differing field.
pub fn assert_exported_attributes_eq(expected: &Exported, actual: &Exported) {
    assert_eq!(expected.function_name, actual.function_name, "function_name");
    assert_eq!(expected.in_avals, actual.in_avals, "in_avals");
    assert_eq!(expected.out_avals, actual.out_avals, "out_avals");
    assert_eq!(expected.platforms, actual.platforms, "platforms");
    assert_eq!(expected.nr_devices, actual.nr_devices, "nr_devices");
    assert_eq!(expected.opset_imports, actual.opset_imports, "opset_imports");
    assert_eq!(expected.module, actual.module, "module");
}
