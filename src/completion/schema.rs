use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

/// JSON Schema for `T` with every subschema inlined, as sent with each request
pub fn output_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    // A derived schema always serializes
    serde_json::to_value(root).unwrap_or_default()
}
