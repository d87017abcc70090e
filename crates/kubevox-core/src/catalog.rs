//! Function catalog exporter.
//!
//! Turns the operation store into the function-calling contract handed to
//! the language model. Export is a pure function of the store: an unchanged
//! catalog always yields byte-identical JSON, which keeps model prompts
//! reproducible.

use serde_json::{json, Map, Value};

use kubevox_contracts::{
    model::FunctionSpec,
    operation::{ParamSpec, ParamType},
};

use crate::store::OperationStore;

/// Export every registered operation, in registration order.
pub fn export(store: &OperationStore) -> Vec<FunctionSpec> {
    store
        .all()
        .map(|descriptor| FunctionSpec {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: parameters_schema(&descriptor.parameters),
        })
        .collect()
}

/// Render an exported catalog as compact JSON.
pub fn to_json(specs: &[FunctionSpec]) -> String {
    Value::Array(
        specs
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "description": f.description,
                    "parameters": f.parameters,
                })
            })
            .collect(),
    )
    .to_string()
}

/// JSON Schema object for a parameter list. Properties keep declaration order.
fn parameters_schema(parameters: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for spec in parameters {
        let mut property = type_schema(&spec.param_type);
        property.insert("description".into(), Value::String(spec.description.clone()));
        if let Some(default) = &spec.default {
            property.insert("default".into(), default.to_json());
        }
        properties.insert(spec.name.clone(), Value::Object(property));

        if spec.required {
            required.push(Value::String(spec.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn type_schema(param_type: &ParamType) -> Map<String, Value> {
    let mut schema = Map::new();
    match param_type {
        ParamType::String => {
            schema.insert("type".into(), json!("string"));
        }
        ParamType::Integer => {
            schema.insert("type".into(), json!("integer"));
        }
        ParamType::Boolean => {
            schema.insert("type".into(), json!("boolean"));
        }
        ParamType::Enum(values) => {
            schema.insert("type".into(), json!("string"));
            schema.insert("enum".into(), json!(values));
        }
    }
    schema
}
