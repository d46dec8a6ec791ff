//! Line-delimited JSON protocol: one `{"id","method","params"}` request per
//! line in, one `{"id","ok",...}` response per line out.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Request};

/// Handle one raw input line. Blank lines produce no output.
pub fn handle_line(state: &mut AppState, line: &str) -> Option<serde_json::Value> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Request>(line) {
        Ok(req) => Some(handle_request(state, req)),
        // Can't reply with an id we couldn't parse.
        Err(e) => Some(serde_json::json!({
            "ok": false,
            "error": { "code": "bad_json", "message": e.to_string() }
        })),
    }
}
