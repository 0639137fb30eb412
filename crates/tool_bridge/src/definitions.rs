use agent_provider::ToolDefinition;
use serde_json::json;

pub const SAVE_TEXT_TOOL: &str = "save_text";
pub const EXECUTE_SCRIPT_TOOL: &str = "execute_script";

/// Argument keys the host supplies itself; stripped from agent input before decoding.
pub const INJECTED_ARGUMENTS: &[&str] = &["cwd"];

/// Descriptors handed to providers for tool discovery.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SAVE_TEXT_TOOL.to_string(),
            description: Some(
                "Save text to a file in the conversation folder. Set is_code to true for \
                 scripts; they are stored in a reserved folder and can then be run with \
                 execute_script. Existing files are overwritten."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Full text to write."
                    },
                    "filename": {
                        "type": "string",
                        "description": "Relative file name, for example `summary.md` or `plot_sales.py`."
                    },
                    "is_code": {
                        "type": "boolean",
                        "description": "True when the content is a script to execute later.",
                        "default": false
                    }
                },
                "required": ["content", "filename"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: EXECUTE_SCRIPT_TOOL.to_string(),
            description: Some(
                "Execute a Python script previously saved with save_text(is_code=true). \
                 The script runs with the conversation folder as its current directory, so \
                 uploaded files can be opened by name. Returns status, stdout, and stderr."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File name the script was saved under."
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{tool_definitions, INJECTED_ARGUMENTS};

    #[test]
    fn schemas_never_expose_injected_arguments() {
        for definition in tool_definitions() {
            let properties = definition.input_schema["properties"]
                .as_object()
                .expect("object schema");
            for injected in INJECTED_ARGUMENTS {
                assert!(
                    !properties.contains_key(*injected),
                    "{} exposes {injected}",
                    definition.name
                );
            }
        }
    }

    #[test]
    fn definitions_cover_both_tools_in_order() {
        let names: Vec<String> = tool_definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        assert_eq!(names, vec!["save_text", "execute_script"]);
    }
}
