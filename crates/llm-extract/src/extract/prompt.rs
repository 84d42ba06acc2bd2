//! The two instruction messages every extraction sends.

use serde_json::Value;

/// Builds the context block: `data` followed by a blank line, then the
/// rendered readable context.
pub(crate) fn context_block(data: Option<&Value>, readable: Option<&str>) -> String {
    let mut context = String::new();
    match data.filter(|d| !is_blank(d)) {
        None => {}
        Some(Value::String(s)) => {
            context.push_str(s);
            context.push_str("\n\n");
        }
        Some(other) => {
            context.push_str(&other.to_string());
            context.push_str("\n\n");
        }
    }
    if let Some(readable) = readable {
        context.push_str(readable);
    }
    context
}

/// `null`, `false`, zero and `""` contribute nothing to the context.
/// Empty arrays and objects are still rendered.
fn is_blank(data: &Value) -> bool {
    match data {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub(crate) fn system_message(context: &str) -> String {
    format!(
        "
Please act as an efficient, competent, conscientious, and industrious professional assistant.

Help the user achieve their goals, and you do so in a way that is as efficient as possible, without unnecessary fluff, but also without sacrificing professionalism.
Always be polite and respectful, and prefer brevity over verbosity.

The user has provided you with the following context:
```
{context}
```

They have also provided you with a function called {action} you MUST call to initiate actions on their behalf.

Please assist them as best you can.

This is not a conversation, so please do not ask questions. Just call the function without saying anything else.
",
        action = super::EXTRACT_ACTION,
    )
}

pub(crate) fn instructions_message(instructions: &str) -> String {
    format!(
        "
The user has given you the following task to complete:

```
{instructions}
```

Any additional messages provided are for providing context only and should not be used to ask questions or engage in conversation.
"
    )
}
