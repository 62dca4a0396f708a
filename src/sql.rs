use chrono::NaiveDate;
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertResource {
        id: Ulid,
        rtype: ResourceType,
        capacity: u32,
        active: bool,
    },
    UpdateResource {
        id: Ulid,
        capacity: Option<u32>,
        active: Option<bool>,
    },
    DeleteResource {
        id: Ulid,
    },
    InsertReservation {
        id: Ulid,
        resource_id: Option<Ulid>,
        pet_id: Ulid,
        customer_id: Ulid,
        service_id: Ulid,
        stay: Stay,
        status: Option<ReservationStatus>,
    },
    BatchBookRequests {
        requests: Vec<BookingRequest>,
    },
    CancelReservation {
        id: Ulid,
    },
    UpdateReservationStatus {
        id: Ulid,
        status: ReservationStatus,
    },
    AssignReservation {
        id: Ulid,
        resource_id: Ulid,
    },
    SelectResources,
    SelectReservations {
        resource_id: Option<Ulid>,
    },
    SelectAvailability {
        category: String,
        stay: Stay,
    },
    SelectFreeWindows {
        resource_id: Ulid,
        stay: Stay,
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
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "resources" => {
            let values = extract_insert_values(insert)?;
            if values.len() < 2 {
                return Err(SqlError::WrongArity("resources", 2, values.len()));
            }
            let id = parse_ulid(&values[0])?;
            let rtype = parse_resource_type(&values[1])?;
            let capacity = if values.len() >= 3 {
                parse_u32(&values[2])?
            } else {
                1
            };
            let active = if values.len() >= 4 {
                parse_bool(&values[3])?
            } else {
                true
            };
            Ok(Command::InsertResource {
                id,
                rtype,
                capacity,
                active,
            })
        }
        "reservations" => {
            let all_rows = extract_all_insert_rows(insert)?;
            if all_rows.len() > 1 {
                return Err(SqlError::Unsupported(
                    "multi-row reservations INSERT; use reservation_requests for batch allocation"
                        .into(),
                ));
            }
            let values = &all_rows[0];
            if values.len() < 7 {
                return Err(SqlError::WrongArity("reservations", 7, values.len()));
            }
            let status = if values.len() >= 8 {
                Some(parse_status(&values[7])?)
            } else {
                None
            };
            Ok(Command::InsertReservation {
                id: parse_ulid(&values[0])?,
                resource_id: parse_ulid_or_null(&values[1])?,
                pet_id: parse_ulid(&values[2])?,
                customer_id: parse_ulid(&values[3])?,
                service_id: parse_ulid(&values[4])?,
                stay: Stay::new(parse_date(&values[5])?, parse_date(&values[6])?),
                status,
            })
        }
        "reservation_requests" => {
            let all_rows = extract_all_insert_rows(insert)?;
            let mut requests = Vec::with_capacity(all_rows.len());
            for (i, row) in all_rows.iter().enumerate() {
                if row.len() < 7 {
                    return Err(SqlError::WrongArity("reservation_requests row", 7, row.len()));
                }
                let row_err = |e: SqlError| SqlError::Parse(format!("row {i}: {e}"));
                requests.push(BookingRequest {
                    id: parse_ulid(&row[0]).map_err(row_err)?,
                    pet_id: parse_ulid(&row[1]).map_err(row_err)?,
                    customer_id: parse_ulid(&row[2]).map_err(row_err)?,
                    service_id: parse_ulid(&row[3]).map_err(row_err)?,
                    category: parse_string(&row[4]).map_err(row_err)?,
                    stay: Stay::new(
                        parse_date(&row[5]).map_err(row_err)?,
                        parse_date(&row[6]).map_err(row_err)?,
                    ),
                });
            }
            Ok(Command::BatchBookRequests { requests })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "resources" => Ok(Command::DeleteResource { id }),
        "reservations" => Ok(Command::CancelReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_id(selection)?;

    match table.as_str() {
        "resources" => {
            let mut capacity = None;
            let mut active = None;
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "capacity" => capacity = Some(parse_u32(&a.value)?),
                    "active" => active = Some(parse_bool(&a.value)?),
                    other => {
                        return Err(SqlError::Parse(format!("cannot update column: {other}")));
                    }
                }
            }
            if capacity.is_none() && active.is_none() {
                return Err(SqlError::Parse("no updatable columns in SET".into()));
            }
            Ok(Command::UpdateResource {
                id,
                capacity,
                active,
            })
        }
        "reservations" => {
            if assignments.len() != 1 {
                return Err(SqlError::Parse(
                    "reservations UPDATE takes exactly one of: status, resource_id".into(),
                ));
            }
            let a = &assignments[0];
            match assignment_column(a)?.as_str() {
                "status" => Ok(Command::UpdateReservationStatus {
                    id,
                    status: parse_status(&a.value)?,
                }),
                "resource_id" => Ok(Command::AssignReservation {
                    id,
                    resource_id: parse_ulid(&a.value)?,
                }),
                other => Err(SqlError::Parse(format!("cannot update column: {other}"))),
            }
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "resources" => Ok(Command::SelectResources),
        "reservations" => Ok(Command::SelectReservations {
            resource_id: filters.resource_id,
        }),
        "availability" => Ok(Command::SelectAvailability {
            stay: filters.stay()?,
            category: filters.category.ok_or(SqlError::MissingFilter("category"))?,
        }),
        "free_windows" => Ok(Command::SelectFreeWindows {
            resource_id: filters
                .resource_id
                .ok_or(SqlError::MissingFilter("resource_id"))?,
            stay: filters.stay()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── WHERE-clause filters ──────────────────────────────────────

#[derive(Default)]
struct Filters {
    category: Option<String>,
    resource_id: Option<Ulid>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl Filters {
    fn stay(&self) -> Result<Stay, SqlError> {
        let check_in = self.start_date.ok_or(SqlError::MissingFilter("start_date"))?;
        let check_out = self.end_date.ok_or(SqlError::MissingFilter("end_date"))?;
        Ok(Stay::new(check_in, check_out))
    }
}

fn collect_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                collect_filters(left, filters)?;
                collect_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left);
                if col.as_deref() == Some("category") {
                    filters.category = Some(parse_string(right)?);
                } else if col.as_deref() == Some("resource_id") {
                    filters.resource_id = Some(parse_ulid(right)?);
                }
            }
            ast::BinaryOperator::GtEq => {
                if expr_column_name(left).as_deref() == Some("start_date") {
                    filters.start_date = Some(parse_date(right)?);
                }
            }
            ast::BinaryOperator::LtEq => {
                if expr_column_name(left).as_deref() == Some("end_date") {
                    filters.end_date = Some(parse_date(right)?);
                }
            }
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

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
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

fn assignment_column(a: &ast::Assignment) -> Result<String, SqlError> {
    match &a.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Parse("unsupported assignment target".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let rows = extract_all_insert_rows(insert)?;
    Ok(rows[0].clone())
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
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

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_ulid(expr).map(Some)
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    s.parse::<NaiveDate>()
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_resource_type(expr: &Expr) -> Result<ResourceType, SqlError> {
    let s = parse_string(expr)?;
    ResourceType::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown resource type: {s}")))
}

fn parse_status(expr: &Expr) -> Result<ReservationStatus, SqlError> {
    let s = parse_string(expr)?;
    ReservationStatus::parse(&s)
        .ok_or_else(|| SqlError::Parse(format!("unknown reservation status: {s}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
