//! Structural repair of message histories before dispatch.
//!
//! Upstream APIs enforce invariants the canonical history may not satisfy:
//! some reject a system message that is not immediately followed by a user
//! turn, and all of them reject an assistant tool call that never receives
//! a tool result. [`auto_fix_messages`] restores both invariants in a
//! single left-to-right pass. It is pure: the input is not modified and
//! applying it twice yields the same sequence as applying it once.

use serde_json::Value;

use crate::chat::{Message, Role};

/// Repair a message sequence.
///
/// Two fixes are applied, in input order:
///
/// 1. If the first message has role [`Role::System`] and the second (if
///    any) is not a user message, a synthetic `user` turn with content
///    `"go on"` is inserted after the system message.
/// 2. For every message carrying tool calls, the following
///    `tool_calls.len()` input messages are scanned for tool results;
///    each unanswered call id gets a synthetic `tool` message with
///    content `"tool call cancelled"` appended directly after the
///    calling message, so id matching stays within the turn window.
///
/// Messages with role [`Role::Comment`] are left in place; dropping them
/// is the dispatcher's job.
pub fn auto_fix_messages(messages: &[Message]) -> Vec<Message> {
    let mut fixed = Vec::with_capacity(messages.len());

    for (index, msg) in messages.iter().enumerate() {
        fixed.push(msg.clone());

        if index == 0 && msg.role == Role::System {
            let needs_user = match messages.get(1) {
                Some(next) => next.role != Role::User,
                None => true,
            };

            if needs_user {
                fixed.push(Message::new(Role::User, "go on"));
            }
        }

        if !msg.tool_calls.is_empty() {
            let window = &messages[index + 1..(index + 1 + msg.tool_calls.len()).min(messages.len())];

            for call in &msg.tool_calls {
                let answered = window
                    .iter()
                    .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(&call.id));

                if !answered {
                    fixed.push(cancelled_result(call.id.clone(), call.function.name.clone()));
                }
            }
        }
    }

    fixed
}

fn cancelled_result(tool_call_id: String, name: String) -> Message {
    Message {
        role: Role::Tool,
        content: Value::String("tool call cancelled".to_string()),
        name: Some(name),
        tool_call_id: Some(tool_call_id),
        tool_calls: Vec::new(),
        extra: serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{FunctionCall, ToolCall};
    use serde_json::json;

    fn tool_call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
            extra_content: None,
            extra: serde_json::Map::new(),
        }
    }

    fn assistant_with_calls(calls: Vec<ToolCall>) -> Message {
        let mut msg = Message::new(Role::Assistant, "");
        msg.tool_calls = calls;
        msg
    }

    fn tool_result(id: &str) -> Message {
        let mut msg = Message::new(Role::Tool, "ok");
        msg.tool_call_id = Some(id.to_string());
        msg
    }

    fn as_json(messages: &[Message]) -> Value {
        serde_json::to_value(messages).unwrap()
    }

    #[test]
    fn system_first_inserts_user_turn() {
        let input = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::Assistant, "hello"),
        ];

        let fixed = auto_fix_messages(&input);

        assert_eq!(fixed.len(), 3);
        assert_eq!(fixed[1].role, Role::User);
        assert_eq!(fixed[1].content, json!("go on"));
        assert_eq!(fixed[2].role, Role::Assistant);
    }

    #[test]
    fn lone_system_message_gets_user_turn() {
        let input = vec![Message::new(Role::System, "be brief")];

        let fixed = auto_fix_messages(&input);

        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[1].role, Role::User);
    }

    #[test]
    fn system_then_user_untouched() {
        let input = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hi"),
        ];

        assert_eq!(as_json(&auto_fix_messages(&input)), as_json(&input));
    }

    #[test]
    fn unanswered_tool_call_is_closed() {
        let input = vec![
            Message::new(Role::User, "weather?"),
            assistant_with_calls(vec![tool_call("a", "get_weather")]),
        ];

        let fixed = auto_fix_messages(&input);

        assert_eq!(fixed.len(), 3);
        assert_eq!(fixed[2].role, Role::Tool);
        assert_eq!(fixed[2].tool_call_id.as_deref(), Some("a"));
        assert_eq!(fixed[2].content, json!("tool call cancelled"));
        assert_eq!(fixed[2].name.as_deref(), Some("get_weather"));
    }

    #[test]
    fn synthetic_results_precede_later_content() {
        // One of two calls answered: the synthetic closure for "a" must
        // land before the real result for "b".
        let input = vec![
            assistant_with_calls(vec![tool_call("a", "f"), tool_call("b", "g")]),
            tool_result("b"),
            Message::new(Role::Assistant, "done"),
        ];

        let fixed = auto_fix_messages(&input);

        assert_eq!(fixed.len(), 4);
        assert_eq!(fixed[1].tool_call_id.as_deref(), Some("a"));
        assert_eq!(fixed[1].content, json!("tool call cancelled"));
        assert_eq!(fixed[2].tool_call_id.as_deref(), Some("b"));
        assert_eq!(fixed[3].role, Role::Assistant);
    }

    #[test]
    fn results_outside_window_do_not_count() {
        // The answer for "a" arrives after the scan window of one
        // message, so a synthetic closure is still inserted.
        let input = vec![
            assistant_with_calls(vec![tool_call("a", "f")]),
            Message::new(Role::Assistant, "interlude"),
            tool_result("a"),
        ];

        let fixed = auto_fix_messages(&input);

        assert_eq!(fixed[1].role, Role::Tool);
        assert_eq!(fixed[1].content, json!("tool call cancelled"));
    }

    #[test]
    fn every_call_has_a_result_after_repair() {
        let input = vec![
            Message::new(Role::System, "s"),
            assistant_with_calls(vec![tool_call("a", "f"), tool_call("b", "g")]),
            tool_result("a"),
        ];

        let fixed = auto_fix_messages(&input);

        for msg in &fixed {
            for call in &msg.tool_calls {
                let answered = fixed
                    .iter()
                    .filter(|m| m.role == Role::Tool)
                    .filter(|m| m.tool_call_id.as_deref() == Some(&call.id))
                    .count();
                assert_eq!(answered, 1, "call {} not answered exactly once", call.id);
            }
        }
    }

    #[test]
    fn repair_is_idempotent() {
        let input = vec![
            Message::new(Role::System, "s"),
            assistant_with_calls(vec![tool_call("a", "f"), tool_call("b", "g")]),
            tool_result("b"),
        ];

        let once = auto_fix_messages(&input);
        let twice = auto_fix_messages(&once);

        assert_eq!(as_json(&once), as_json(&twice));
    }
}
