//! Verify error normalization and token decoding against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Every error vector is replayed through all six parse methods, since the
//! normalization policy is shared and only the fallback message differs.

use todo_core::{decode_claims, ApiError, HttpResponse, Operation, TodoClient};

fn client() -> TodoClient {
    TodoClient::new("http://localhost:8000")
}

/// Run the parse method for `op` and return only its error.
fn parse_error(c: &TodoClient, op: Operation, response: HttpResponse) -> ApiError {
    let outcome = Ok(response);
    match op {
        Operation::Register => c.parse_register(outcome).unwrap_err(),
        Operation::Login => c.parse_login(outcome).unwrap_err(),
        Operation::ListTodos => c.parse_list_todos(outcome).unwrap_err(),
        Operation::CreateTodo => c.parse_create_todo(outcome).unwrap_err(),
        Operation::UpdateTodo => c.parse_update_todo(outcome).unwrap_err(),
        Operation::DeleteTodo => c.parse_delete_todo(outcome).unwrap_err(),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let body = case["body"].as_str().unwrap();

        for op in Operation::ALL {
            let err = parse_error(&c, op, HttpResponse::new(status, body));
            let msg = err.to_string();

            if let Some(parts) = case.get("expected_contains") {
                for part in parts.as_array().unwrap() {
                    let part = part.as_str().unwrap();
                    assert!(msg.contains(part), "{name} / {op:?}: {msg:?} lacks {part:?}");
                }
                continue;
            }

            let expected = match case["expected"].as_str().unwrap() {
                "default" => op.default_error(),
                other => other,
            };
            assert_eq!(msg, expected, "{name} / {op:?}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[test]
fn token_test_vectors() {
    let raw = include_str!("../../test-vectors/tokens.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let token = case["token"].as_str().unwrap();
        let decoded = decode_claims(token);

        match case["expected"].as_object() {
            None => assert!(decoded.is_none(), "{name}: expected no claims, got {decoded:?}"),
            Some(expected) => {
                let claims = decoded.unwrap_or_else(|| panic!("{name}: expected claims"));
                assert_eq!(claims.exp, expected["exp"].as_i64().unwrap(), "{name}: exp");
                assert_eq!(claims.username, expected["username"].as_str().unwrap(), "{name}: username");
            }
        }
    }
}
