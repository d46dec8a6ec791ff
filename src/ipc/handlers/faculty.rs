use crate::faculty::{self, NewFaculty};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_params, with_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn faculties_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let faculties = faculty::list(conn, get_optional_str(params, "role"))?;
    Ok(json!({ "faculties": faculties }))
}

fn faculties_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let input: NewFaculty = parse_params(params)?;
    Ok(json!({ "faculty": faculty::create(conn, input)? }))
}

fn faculties_update_status(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let status = get_required_str(params, "employmentStatus")?;
    Ok(json!({ "faculty": faculty::update_status(conn, &id, &status)? }))
}

fn faculties_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    faculty::delete(conn, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "faculties.list" => faculties_list,
        "faculties.create" => faculties_create,
        "faculties.updateStatus" => faculties_update_status,
        "faculties.delete" => faculties_delete,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
