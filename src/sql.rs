use chrono::{NaiveDate, NaiveTime, Timelike};
use sqlparser::ast::{
    self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::catalog;
use crate::model::*;

/// Parsed command from SQL input. The virtual tables (`calendar`,
/// `conflicts`, `conflict_check`, `timeline`, `recommendations`,
/// `optimization`) are read-side projections over the one real table,
/// `bookings`.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertBooking {
        request: BookingRequest,
    },
    SelectBookings {
        project_id: String,
    },
    SelectCalendar {
        project_id: String,
    },
    SelectConflictCheck {
        project_id: String,
        scheduled_date: NaiveDate,
        start_minute: Minutes,
        duration_min: Minutes,
    },
    SelectConflicts {
        project_id: String,
    },
    SelectTimeline {
        project_id: String,
    },
    SelectRecommendations {
        project_id: String,
    },
    SelectOptimization {
        project_id: String,
    },
    UpdateStatus {
        id: Ulid,
        status: BookingStatus,
        notes: Option<String>,
        actual_cost: Option<f64>,
    },
    CancelBooking {
        id: Ulid,
        reason: String,
    },
    AddReview {
        id: Ulid,
        rating: u8,
        review: String,
    },
    Listen {
        channel: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.to_uppercase().starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(
            "INSERT INTO bookings requires a column list".into(),
        ));
    }
    let values = extract_insert_values(insert)?;
    if values.len() != insert.columns.len() {
        return Err(SqlError::Parse(format!(
            "bookings: {} columns but {} values",
            insert.columns.len(),
            values.len()
        )));
    }

    let mut id = None;
    let mut project_id = None;
    let mut service = None;
    let mut provider_id = None;
    let mut provider_name = None;
    let mut scheduled_date = None;
    let mut start_minute = None;
    let mut duration_min = None;
    let mut location = None;
    let mut instructions = None;
    let mut details = None;
    let mut estimated_cost = None;

    for (col, expr) in insert.columns.iter().zip(values.iter()) {
        match col.value.to_lowercase().as_str() {
            "id" => id = parse_ulid_or_null(expr)?,
            "project_id" => project_id = Some(parse_string(expr)?),
            "service_type" => service = Some(parse_service_type(expr)?),
            "provider_id" => provider_id = Some(parse_string(expr)?),
            "provider_name" => provider_name = Some(parse_string(expr)?),
            "scheduled_date" => scheduled_date = Some(parse_date(expr)?),
            "start_time" => start_minute = Some(parse_time_minutes(expr)?),
            "duration_hours" => duration_min = parse_duration_min_or_null(expr)?,
            "location" => location = Some(parse_string(expr)?),
            "instructions" => instructions = parse_string_or_null(expr)?,
            "details" => details = parse_json_or_null(expr)?,
            "estimated_cost" => estimated_cost = Some(parse_f64(expr)?),
            other => return Err(SqlError::UnknownColumn(other.to_string())),
        }
    }

    let request = BookingRequest {
        id,
        project_id: project_id.ok_or(SqlError::MissingColumn("project_id"))?,
        service: service.ok_or(SqlError::MissingColumn("service_type"))?,
        provider_id: provider_id.ok_or(SqlError::MissingColumn("provider_id"))?,
        provider_name: provider_name.ok_or(SqlError::MissingColumn("provider_name"))?,
        scheduled_date: scheduled_date.ok_or(SqlError::MissingColumn("scheduled_date"))?,
        start_minute: start_minute.ok_or(SqlError::MissingColumn("start_time"))?,
        duration_min,
        location: location.ok_or(SqlError::MissingColumn("location"))?,
        instructions,
        details,
        estimated_cost: estimated_cost.ok_or(SqlError::MissingColumn("estimated_cost"))?,
    };
    Ok(Command::InsertBooking { request })
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut status = None;
    let mut notes = None;
    let mut actual_cost = None;
    let mut rating = None;
    let mut review = None;

    for assignment in assignments {
        let col = assignment_column(assignment)
            .ok_or_else(|| SqlError::Parse("unsupported assignment target".into()))?;
        match col.as_str() {
            "status" => status = Some(parse_status(&assignment.value)?),
            "notes" => notes = parse_string_or_null(&assignment.value)?,
            "actual_cost" => actual_cost = parse_f64_or_null(&assignment.value)?,
            "rating" => rating = Some(parse_u8(&assignment.value)?),
            "review" => review = parse_string_or_null(&assignment.value)?,
            other => return Err(SqlError::UnknownColumn(other.to_string())),
        }
    }

    if let Some(rating) = rating {
        let review = review.ok_or(SqlError::MissingColumn("review"))?;
        return Ok(Command::AddReview { id, rating, review });
    }
    match status {
        Some(BookingStatus::Cancelled) => Ok(Command::CancelBooking {
            id,
            reason: notes.unwrap_or_default(),
        }),
        Some(status) => Ok(Command::UpdateStatus {
            id,
            status,
            notes,
            actual_cost,
        }),
        None => Err(SqlError::Unsupported(
            "UPDATE bookings must set status or rating/review".into(),
        )),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Option<String> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => object_name_last(name),
        _ => None,
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = SelectFilters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }
    let project_id = filters
        .project_id
        .clone()
        .ok_or(SqlError::MissingFilter("project_id"))?;

    match table.as_str() {
        "bookings" => Ok(Command::SelectBookings { project_id }),
        "calendar" => Ok(Command::SelectCalendar { project_id }),
        "conflicts" => Ok(Command::SelectConflicts { project_id }),
        "timeline" => Ok(Command::SelectTimeline { project_id }),
        "recommendations" => Ok(Command::SelectRecommendations { project_id }),
        "optimization" => Ok(Command::SelectOptimization { project_id }),
        "conflict_check" => {
            // Duration falls back to the candidate's service-type default,
            // the same rule creation applies.
            let duration_min = match (filters.duration_min, filters.service) {
                (Some(d), _) => d,
                (None, Some(service)) => catalog::profile(service).default_duration_min,
                (None, None) => return Err(SqlError::MissingFilter("duration_hours")),
            };
            Ok(Command::SelectConflictCheck {
                project_id,
                scheduled_date: filters
                    .scheduled_date
                    .ok_or(SqlError::MissingFilter("scheduled_date"))?,
                start_minute: filters
                    .start_minute
                    .ok_or(SqlError::MissingFilter("start_time"))?,
                duration_min,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Default)]
struct SelectFilters {
    project_id: Option<String>,
    scheduled_date: Option<NaiveDate>,
    start_minute: Option<Minutes>,
    duration_min: Option<Minutes>,
    service: Option<ServiceType>,
}

fn extract_filters(expr: &Expr, filters: &mut SelectFilters) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_filters(left, filters)?;
                extract_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("project_id") => filters.project_id = Some(parse_string(right)?),
                Some("scheduled_date") => filters.scheduled_date = Some(parse_date(right)?),
                Some("start_time") => filters.start_minute = Some(parse_time_minutes(right)?),
                Some("duration_hours") => {
                    filters.duration_min = parse_duration_min_or_null(right)?
                }
                Some("service_type") => filters.service = Some(parse_service_type(right)?),
                _ => {}
            },
            _ => {}
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.len() != 1 {
                return Err(SqlError::Parse("expected exactly one VALUES row".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_string(expr).map(Some)
}

/// The details payload travels as raw JSON text; reject garbage here so the
/// store only ever holds valid documents.
fn parse_json_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    let Some(text) = parse_string_or_null(expr)? else {
        return Ok(None);
    };
    serde_json::from_str::<serde_json::Value>(&text)
        .map_err(|e| SqlError::Parse(format!("bad details JSON: {e}")))?;
    Ok(Some(text))
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_ulid(expr).map(Some)
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_f64_or_null(expr: &Expr) -> Result<Option<f64>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_f64(expr).map(Some)
}

fn parse_u8(expr: &Expr) -> Result<u8, SqlError> {
    let v = parse_f64(expr)?;
    if v.fract() != 0.0 || !(0.0..=255.0).contains(&v) {
        return Err(SqlError::Parse(format!("{v} out of u8 range")));
    }
    Ok(v as u8)
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

/// "HH:MM" (or "HH:MM:SS") → minutes from midnight.
fn parse_time_minutes(expr: &Expr) -> Result<Minutes, SqlError> {
    let s = parse_string(expr)?;
    let t = NaiveTime::parse_from_str(&s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
        .map_err(|e| SqlError::Parse(format!("bad time {s:?}: {e}")))?;
    Ok((t.hour() * 60 + t.minute()) as Minutes)
}

/// Fractional hours are accepted; anything below a whole minute is rounded.
fn parse_duration_min_or_null(expr: &Expr) -> Result<Option<Minutes>, SqlError> {
    let Some(hours) = parse_f64_or_null(expr)? else {
        return Ok(None);
    };
    if !hours.is_finite() || hours < 0.0 {
        return Err(SqlError::Parse(format!("bad duration_hours: {hours}")));
    }
    Ok(Some((hours * 60.0).round() as Minutes))
}

fn parse_service_type(expr: &Expr) -> Result<ServiceType, SqlError> {
    let s = parse_string(expr)?;
    ServiceType::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown service type: {s}")))
}

fn parse_status(expr: &Expr) -> Result<BookingStatus, SqlError> {
    let s = parse_string(expr)?;
    BookingStatus::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown status: {s}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::MissingColumn(c) => write!(f, "missing column: {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
