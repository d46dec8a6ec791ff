use crate::directory::{self, NewStudent, StudentPatch};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, get_string_list, parse_params, with_db};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let students = directory::list(conn, get_optional_str(params, "admissionType"))?;
    Ok(json!({ "students": students }))
}

fn students_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    Ok(json!({ "student": directory::get_by_student_id(conn, &student_id)? }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let input: NewStudent = parse_params(params)?;
    let student = directory::create(conn, input)?;
    Ok(json!({ "student": student }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let patch: StudentPatch = parse_params(params)?;
    Ok(json!({ "student": directory::update(conn, &id, patch)? }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    directory::delete(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn students_promote(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let (student, next) = directory::with_student(conn, &id, ledger::promote)?;
    Ok(json!({
        "message": format!("Student promoted to semester {}", next.number),
        "student": student,
    }))
}

fn students_edit_semester(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let (student, target) = directory::with_student(conn, &id, |conn, student| {
        ledger::edit_semester(conn, student, &semester_id)
    })?;
    Ok(json!({
        "message": format!("Student semester updated to semester {}", target.number),
        "student": student,
    }))
}

fn students_add_backlog(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let subject_ids = get_string_list(params, "subjectIds")?;
    let (student, added) = directory::with_student(conn, &id, |conn, student| {
        ledger::add_backlog(conn, student, &semester_id, &subject_ids)
    })?;
    Ok(json!({ "added": added, "student": student }))
}

fn students_update_backlog(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let backlog_id = get_required_str(params, "backlogId")?;
    let status = get_required_str(params, "status")?;
    let (student, ()) = directory::with_student(conn, &id, |_, student| {
        ledger::update_backlog_status(student, &backlog_id, &status)
    })?;
    Ok(json!({ "student": student }))
}

fn students_record_result(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let status = get_required_str(params, "status")?;
    let marks = match params.get("marks") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| HandlerErr::bad_params("marks must be a number"))?,
        ),
    };
    let (student, ()) = directory::with_student(conn, &id, |_, student| {
        ledger::record_result(student, &semester_id, &subject_id, &status, marks)
    })?;
    Ok(json!({ "student": student }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.promote" => students_promote,
        "students.editSemester" => students_edit_semester,
        "students.addBacklog" => students_add_backlog,
        "students.updateBacklog" => students_update_backlog,
        "students.recordResult" => students_record_result,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
