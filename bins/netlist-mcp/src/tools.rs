//! The tool catalog served to MCP clients.
//!
//! Every tool is a read-only lookup over the extracted store. Arguments
//! arrive as JSON objects and are deserialized into the store's filter
//! types; results are rendered as pretty-printed JSON text.

use std::sync::Mutex;

use modeldb::{ModelDb, ModelFilter, SubcircuitFilter};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use modeldb::query::ParameterRange;

/// An error produced while executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool does not exist.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The tool arguments did not match the tool's input schema.
    #[error("invalid arguments: {0}")]
    InvalidArgs(#[from] serde_json::Error),
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] modeldb::Error),
}

#[derive(Debug, Deserialize)]
struct QueryModelsArgs {
    model_type: String,
    #[serde(default)]
    name_pattern: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterRange>,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchSubcircuitsArgs {
    #[serde(default)]
    name_pattern: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Dispatches tool calls against the store.
pub struct Toolbox {
    db: Mutex<ModelDb>,
}

impl Toolbox {
    /// Makes a toolbox over the given store.
    pub fn new(db: ModelDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// The tool descriptors reported by `tools/list`.
    pub fn catalog() -> Value {
        json!([
            {
                "name": "query_models",
                "description": "Look up extracted device models by type, optionally \
                    restricted by a name pattern and by numeric parameter ranges. \
                    Returns each matching model's parameters as raw netlist text.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "model_type": {
                            "type": "string",
                            "description": "Device model type, e.g. nmos, pmos, diode. Case-insensitive."
                        },
                        "name_pattern": {
                            "type": "string",
                            "description": "SQL LIKE pattern on the model name; % matches any run of characters."
                        },
                        "parameters": {
                            "type": "array",
                            "description": "Numeric range predicates; a model must satisfy every one.",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string", "description": "Parameter name." },
                                    "min": { "type": "number", "description": "Inclusive lower bound on the scaled value." },
                                    "max": { "type": "number", "description": "Inclusive upper bound on the scaled value." }
                                },
                                "required": ["name"]
                            }
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of models returned."
                        }
                    },
                    "required": ["model_type"]
                }
            },
            {
                "name": "search_subcircuits",
                "description": "Look up extracted subcircuit definitions by name. \
                    Returns each match's captured body and source location.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name_pattern": {
                            "type": "string",
                            "description": "SQL LIKE pattern on the subcircuit name; % matches any run of characters."
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of subcircuits returned."
                        }
                    }
                }
            },
            {
                "name": "list_model_types",
                "description": "List every distinct device model type in the store, with model counts.",
                "inputSchema": { "type": "object", "properties": {} }
            }
        ])
    }

    /// Executes the named tool, returning its text payload.
    pub fn call(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        match name {
            "query_models" => self.query_models(serde_json::from_value(arguments)?),
            "search_subcircuits" => self.search_subcircuits(serde_json::from_value(arguments)?),
            "list_model_types" => self.list_model_types(),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn query_models(&self, args: QueryModelsArgs) -> Result<String, ToolError> {
        let mut filter = ModelFilter::of_type(args.model_type);
        filter.name_pattern = args.name_pattern;
        filter.ranges = args.parameters;
        if let Some(max) = args.max_results {
            filter.max_results = max;
        }
        let results = self.db().query_models(&filter)?;
        Ok(serde_json::to_string_pretty(&results)?)
    }

    fn search_subcircuits(&self, args: SearchSubcircuitsArgs) -> Result<String, ToolError> {
        let filter = SubcircuitFilter {
            name_pattern: args.name_pattern,
            max_results: args.max_results.unwrap_or(modeldb::query::DEFAULT_MAX_RESULTS),
        };
        let results = self.db().search_subcircuits(&filter)?;
        Ok(serde_json::to_string_pretty(&results)?)
    }

    fn list_model_types(&self) -> Result<String, ToolError> {
        let types = self.db().list_model_types()?;
        Ok(serde_json::to_string_pretty(&types)?)
    }

    fn db(&self) -> std::sync::MutexGuard<'_, ModelDb> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolbox() -> Toolbox {
        let mut db = ModelDb::open_in_memory().unwrap();
        let input = ".model nfet nmos l=0.18u w=1u\n.subckt inv a b\nr1 a b 1k\n.ends\n";
        for record in netlist::Parser::new(input, "tools.sp", Default::default()) {
            db.insert_record(&record).unwrap();
        }
        Toolbox::new(db)
    }

    #[test]
    fn catalog_names_all_tools() {
        let names: Vec<String> = Toolbox::catalog()
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["query_models", "search_subcircuits", "list_model_types"]
        );
    }

    #[test]
    fn query_models_round_trips_json() {
        let payload = toolbox()
            .call("query_models", json!({ "model_type": "NMOS" }))
            .unwrap();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["nfet"]["l"], "0.18u");
    }

    #[test]
    fn query_models_applies_ranges() {
        let payload = toolbox()
            .call(
                "query_models",
                json!({
                    "model_type": "nmos",
                    "parameters": [{ "name": "l", "min": 2e-7 }]
                }),
            )
            .unwrap();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, json!({}));
    }

    #[test]
    fn search_subcircuits_returns_location() {
        let payload = toolbox()
            .call("search_subcircuits", json!({ "name_pattern": "in%" }))
            .unwrap();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["inv"]["line_number"], 2);
        assert_eq!(parsed["inv"]["source_file"], "tools.sp");
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let err = toolbox().call("simulate", json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let err = toolbox().call("query_models", json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }
}
