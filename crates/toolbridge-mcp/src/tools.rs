//! Built-in diagnostic tools.
//!
//! Registered through the same builder any host integration uses, so they
//! double as a smoke test for both execution paths.

use serde_json::{json, Value};
use toolbridge_core::{handler_fn, require_str, RegistryBuilder, RegistryError};
use toolbridge_protocol::tool::object_schema;
use toolbridge_protocol::{ToolDescriptor, ToolResult};

pub fn register_builtin(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .register(
            ToolDescriptor::new("ping", "Check that the server is responsive", no_params()),
            handler_fn(|_| Ok(ToolResult::text("pong"))),
        )?
        .register(
            ToolDescriptor::new(
                "echo",
                "Return the given message unchanged",
                object_schema([("msg", json!({"type": "string", "description": "Message to echo back"}))]),
            ),
            handler_fn(|params| Ok(ToolResult::text(require_str(&params, "msg")?))),
        )?
        .register_on_main_thread(
            ToolDescriptor::new(
                "get_thread_info",
                "Report the thread that executes main-thread tools",
                no_params(),
            ),
            |_| Ok(ToolResult::json(&thread_info())),
        )?;

    Ok(())
}

fn no_params() -> Value {
    object_schema(Vec::<(String, Value)>::new())
}

fn thread_info() -> Value {
    let current = std::thread::current();
    json!({
        "name": current.name(),
        "id": format!("{:?}", current.id()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use toolbridge_core::{Dispatcher, MainThreadQueue, ToolRegistry, ToolToggles};
    use toolbridge_protocol::ErrorCode;

    fn registry() -> ToolRegistry {
        let mut builder = RegistryBuilder::new();
        register_builtin(&mut builder).unwrap();
        builder.build()
    }

    #[test]
    fn test_builtin_tools_listed_in_order() {
        let names: Vec<String> = registry().list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["ping", "echo", "get_thread_info"]);
    }

    #[test]
    fn test_disabled_builtin_is_absent() {
        let mut toggles = ToolToggles::default();
        toggles.set("echo", false);
        let mut builder = RegistryBuilder::with_toggles(toggles);
        register_builtin(&mut builder).unwrap();

        assert!(builder.build().lookup("echo").is_none());
    }

    #[tokio::test]
    async fn test_echo_requires_msg() {
        let dispatcher = Dispatcher::new(Arc::new(registry()));

        let response = dispatcher
            .handle_raw(r#"{"jsonrpc":"2.0","id":"e","method":"echo","params":{"msg":"hi"}}"#)
            .await
            .into_response()
            .unwrap();
        assert_eq!(response.result().unwrap()["content"][0]["text"], json!("hi"));

        let response = dispatcher
            .handle_raw(r#"{"jsonrpc":"2.0","id":"e","method":"echo"}"#)
            .await
            .into_response()
            .unwrap();
        assert_eq!(response.error_object().unwrap().kind(), Some(ErrorCode::InvalidParams));
    }

    #[tokio::test]
    async fn test_thread_info_runs_on_main_thread() {
        let handle = MainThreadQueue::spawn_dedicated("toolbridge-main").unwrap();
        let dispatcher = Dispatcher::builder(Arc::new(registry())).main_thread(handle).build();

        let response = dispatcher
            .handle_raw(r#"{"jsonrpc":"2.0","id":1,"method":"get_thread_info"}"#)
            .await
            .into_response()
            .unwrap();
        let text = response.result().unwrap()["content"][0]["text"].as_str().unwrap().to_string();
        let info: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(info["name"], json!("toolbridge-main"));
    }
}
