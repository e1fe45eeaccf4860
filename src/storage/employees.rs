//! Employee records: CRUD, Telegram lookup, and eligibility queries.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::core::error::{AppError, AppResult};
use crate::storage::models::Employee;

/// Payload for creating an employee (REST API and bot auto-provisioning).
#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub telegram_id: i64,
    pub telegram_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub start_date: NaiveDate,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "ru".to_string()
}

/// Partial update payload; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub telegram_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub language: Option<String>,
    pub is_active: Option<bool>,
}

fn row_to_employee(row: &Row<'_>) -> rusqlite::Result<Employee> {
    let start_date: String = row.get("start_date")?;
    let start_date = start_date.parse::<NaiveDate>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Employee {
        id: row.get("id")?,
        telegram_id: row.get("telegram_id")?,
        telegram_username: row.get("telegram_username")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        start_date,
        branch: row.get("branch")?,
        department: row.get("department")?,
        position: row.get("position")?,
        language: row.get("language")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
    })
}

const EMPLOYEE_COLUMNS: &str = "id, telegram_id, telegram_username, first_name, last_name, \
                                start_date, branch, department, position, language, is_active, created_at";

pub fn create(conn: &Connection, new: &NewEmployee) -> AppResult<Employee> {
    conn.execute(
        "INSERT INTO employees (telegram_id, telegram_username, first_name, last_name,
                                start_date, branch, department, position, language)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.telegram_id,
            new.telegram_username,
            new.first_name,
            new.last_name,
            new.start_date.to_string(),
            new.branch,
            new.department,
            new.position,
            new.language,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get(conn, id)?.ok_or_else(|| AppError::NotFound(format!("employee {} after insert", id)))
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Employee>> {
    conn.query_row(
        &format!("SELECT {} FROM employees WHERE id = ?1", EMPLOYEE_COLUMNS),
        params![id],
        row_to_employee,
    )
    .optional()
    .map_err(AppError::from)
}

pub fn get_by_telegram_id(conn: &Connection, telegram_id: i64) -> AppResult<Option<Employee>> {
    conn.query_row(
        &format!("SELECT {} FROM employees WHERE telegram_id = ?1", EMPLOYEE_COLUMNS),
        params![telegram_id],
        row_to_employee,
    )
    .optional()
    .map_err(AppError::from)
}

pub fn list(conn: &Connection, skip: i64, limit: i64) -> AppResult<Vec<Employee>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM employees ORDER BY id LIMIT ?1 OFFSET ?2",
        EMPLOYEE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit, skip], row_to_employee)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

pub fn update(conn: &Connection, id: i64, upd: &EmployeeUpdate) -> AppResult<Option<Employee>> {
    if get(conn, id)?.is_none() {
        return Ok(None);
    }

    conn.execute(
        "UPDATE employees SET
            telegram_username = COALESCE(?2, telegram_username),
            first_name        = COALESCE(?3, first_name),
            last_name         = COALESCE(?4, last_name),
            start_date        = COALESCE(?5, start_date),
            branch            = COALESCE(?6, branch),
            department        = COALESCE(?7, department),
            position          = COALESCE(?8, position),
            language          = COALESCE(?9, language),
            is_active         = COALESCE(?10, is_active)
         WHERE id = ?1",
        params![
            id,
            upd.telegram_username,
            upd.first_name,
            upd.last_name,
            upd.start_date.map(|d| d.to_string()),
            upd.branch,
            upd.department,
            upd.position,
            upd.language,
            upd.is_active,
        ],
    )?;

    get(conn, id)
}

/// Returns true when a row was removed.
pub fn delete(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute("DELETE FROM employees WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Stores the bot language chosen by the employee.
pub fn set_language(conn: &Connection, telegram_id: i64, language: &str) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE employees SET language = ?2 WHERE telegram_id = ?1",
        params![telegram_id, language],
    )?;
    Ok(changed > 0)
}

/// Active employees whose tenure has reached `days_after_start` days by `today`.
pub fn list_eligible(conn: &Connection, days_after_start: i64, today: NaiveDate) -> AppResult<Vec<Employee>> {
    let cutoff = today - chrono::Duration::days(days_after_start);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM employees
         WHERE is_active = 1 AND start_date <= ?1
         ORDER BY start_date",
        EMPLOYEE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![cutoff.to_string()], row_to_employee)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db;
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn sample(telegram_id: i64, start_date: &str) -> NewEmployee {
        NewEmployee {
            telegram_id,
            telegram_username: Some("ivanov".to_string()),
            first_name: Some("Ivan".to_string()),
            last_name: Some("Ivanov".to_string()),
            start_date: start_date.parse().unwrap(),
            branch: Some("Bishkek".to_string()),
            department: None,
            position: Some("Analyst".to_string()),
            language: "ru".to_string(),
        }
    }

    #[test]
    fn create_and_lookup() {
        let conn = test_conn();
        let emp = create(&conn, &sample(100, "2026-06-01")).unwrap();

        assert_eq!(emp.telegram_id, 100);
        assert!(emp.is_active);

        let by_tg = get_by_telegram_id(&conn, 100).unwrap().unwrap();
        assert_eq!(by_tg.id, emp.id);
        assert!(get_by_telegram_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn duplicate_telegram_id_is_rejected() {
        let conn = test_conn();
        create(&conn, &sample(100, "2026-06-01")).unwrap();
        assert!(create(&conn, &sample(100, "2026-07-01")).is_err());
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let conn = test_conn();
        let emp = create(&conn, &sample(100, "2026-06-01")).unwrap();

        let upd = EmployeeUpdate { position: Some("Senior Analyst".to_string()), ..Default::default() };
        let updated = update(&conn, emp.id, &upd).unwrap().unwrap();

        assert_eq!(updated.position.as_deref(), Some("Senior Analyst"));
        assert_eq!(updated.first_name.as_deref(), Some("Ivan"));
    }

    #[test]
    fn set_language_persists() {
        let conn = test_conn();
        create(&conn, &sample(100, "2026-06-01")).unwrap();

        assert!(set_language(&conn, 100, "en").unwrap());
        let emp = get_by_telegram_id(&conn, 100).unwrap().unwrap();
        assert_eq!(emp.language, "en");

        assert!(!set_language(&conn, 999, "en").unwrap());
    }

    #[test]
    fn eligibility_respects_tenure_window() {
        let conn = test_conn();
        create(&conn, &sample(1, "2026-01-01")).unwrap();
        create(&conn, &sample(2, "2026-08-01")).unwrap();

        let today: NaiveDate = "2026-08-30".parse().unwrap();
        let eligible = list_eligible(&conn, 90, today).unwrap();

        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].telegram_id, 1);
    }
}
