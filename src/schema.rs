//! JSON schema generation for MCP tool inputs.

use rmcp::model::JsonObject;
use rmcp::schemars::{self, JsonSchema, generate::SchemaSettings};
use std::sync::Arc;

/// Generate an inline JSON schema for MCP tools
///
/// Unlike rmcp's default `schema_for_type()`, this function sets `inline_subschemas = true`
/// to generate inline definitions instead of $ref patterns, which MCP clients render
/// as plain form fields.
pub fn inline_schema_for_type<T: JsonSchema>() -> Arc<JsonObject> {
    let mut settings = SchemaSettings::draft07();
    settings.transforms = vec![Box::new(schemars::transform::AddNullable::default())];
    settings.inline_subschemas = true;

    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();

    let object = match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(object)) => object,
        other => {
            tracing::error!(
                "Schema for {} did not serialize to an object: {:?}",
                std::any::type_name::<T>(),
                other
            );
            JsonObject::new()
        }
    };

    Arc::new(object)
}
