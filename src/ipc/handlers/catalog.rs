use crate::catalog;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, get_string_list, with_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn streams_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "streams": catalog::list_streams(conn)? }))
}

fn streams_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    Ok(json!({ "stream": catalog::create_stream(conn, &name)? }))
}

fn streams_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let name = get_required_str(params, "name")?;
    Ok(json!({ "stream": catalog::rename_stream(conn, &id, &name)? }))
}

fn streams_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    catalog::delete_stream(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn departments_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let stream_id = get_optional_str(params, "streamId");
    Ok(json!({ "departments": catalog::list_departments(conn, stream_id)? }))
}

fn departments_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let stream_id = get_required_str(params, "streamId")?;
    Ok(json!({ "department": catalog::create_department(conn, &name, &stream_id)? }))
}

fn departments_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let department = catalog::update_department(
        conn,
        &id,
        get_optional_str(params, "name"),
        get_optional_str(params, "streamId"),
    )?;
    Ok(json!({ "department": department }))
}

fn departments_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    catalog::delete_department(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn subjects_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let department_id = get_optional_str(params, "departmentId");
    Ok(json!({ "subjects": catalog::list_subjects(conn, department_id)? }))
}

fn subjects_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let department_id = get_required_str(params, "departmentId")?;
    Ok(json!({ "subject": catalog::create_subject(conn, &name, &department_id)? }))
}

fn subjects_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let subject = catalog::update_subject(
        conn,
        &id,
        get_optional_str(params, "name"),
        get_optional_str(params, "departmentId"),
    )?;
    Ok(json!({ "subject": subject }))
}

fn subjects_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    catalog::delete_subject(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn semester_number(params: &Value) -> Result<Option<i64>, HandlerErr> {
    match params.get("number") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("number must be an integer")),
    }
}

fn semesters_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "semesters": catalog::list_semesters(conn)? }))
}

fn semesters_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let number = semester_number(params)?.ok_or_else(|| HandlerErr::bad_params("missing number"))?;
    let subject_ids = if params.get("subjectIds").is_some() {
        get_string_list(params, "subjectIds")?
    } else {
        Vec::new()
    };
    Ok(json!({ "semester": catalog::create_semester(conn, number, &subject_ids)? }))
}

fn semesters_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let number = semester_number(params)?;
    let subject_ids = if params.get("subjectIds").is_some() {
        Some(get_string_list(params, "subjectIds")?)
    } else {
        None
    };
    let semester = catalog::update_semester(conn, &id, number, subject_ids.as_deref())?;
    Ok(json!({ "semester": semester }))
}

fn semesters_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    catalog::delete_semester(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn semesters_subjects_for(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let department_id = get_required_str(params, "departmentId")?;
    Ok(json!({ "subjects": catalog::subjects_for(conn, &semester_id, &department_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "streams.list" => streams_list,
        "streams.create" => streams_create,
        "streams.update" => streams_update,
        "streams.delete" => streams_delete,
        "departments.list" => departments_list,
        "departments.create" => departments_create,
        "departments.update" => departments_update,
        "departments.delete" => departments_delete,
        "subjects.list" => subjects_list,
        "subjects.create" => subjects_create,
        "subjects.update" => subjects_update,
        "subjects.delete" => subjects_delete,
        "semesters.list" => semesters_list,
        "semesters.create" => semesters_create,
        "semesters.update" => semesters_update,
        "semesters.delete" => semesters_delete,
        "semesters.subjectsFor" => semesters_subjects_for,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
