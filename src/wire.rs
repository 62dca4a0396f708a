use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::PaddockAuthSource;
use crate::engine::{Engine, EngineError};
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct PaddockHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<PaddockQueryParser>,
}

impl PaddockHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(PaddockQueryParser),
        }
    }

    /// Tenant identity is the connection's database name — required, never
    /// defaulted. A booking write without an explicit tenant would land in
    /// somebody's calendar; refusing is the only safe answer.
    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client.metadata().get("database").cloned().ok_or_else(|| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "3D000".into(),
                "no tenant database specified".into(),
            )))
        })?;
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertResource {
                id,
                rtype,
                capacity,
                active,
            } => {
                engine
                    .create_resource(id, rtype, capacity, active)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateResource {
                id,
                capacity,
                active,
            } => {
                engine
                    .update_resource(id, capacity, active)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteResource { id } => {
                engine.delete_resource(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertReservation {
                id,
                resource_id,
                pet_id,
                customer_id,
                service_id,
                stay,
                status,
            } => {
                engine
                    .book(
                        id,
                        resource_id,
                        pet_id,
                        customer_id,
                        service_id,
                        stay,
                        status.unwrap_or(crate::model::ReservationStatus::Confirmed),
                    )
                    .await
                    .map_err(booking_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::BatchBookRequests { requests } => {
                let assignments = engine.book_batch(requests).await.map_err(booking_err)?;

                let schema = Arc::new(batch_assignment_schema());
                let rows: Vec<PgWireResult<_>> = assignments
                    .into_iter()
                    .map(|a| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&a.reservation_id.to_string())?;
                        encoder.encode_field(&a.pet_id.to_string())?;
                        encoder.encode_field(&a.resource_id.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::CancelReservation { id } => {
                engine.cancel(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::UpdateReservationStatus { id, status } => {
                engine.update_status(id, status).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::AssignReservation { id, resource_id } => {
                engine
                    .assign(id, resource_id)
                    .await
                    .map_err(booking_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectResources => {
                let resources = engine.list_resources().await;

                let schema = Arc::new(resources_schema());
                let rows: Vec<PgWireResult<_>> = resources
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.rtype.as_str())?;
                        encoder.encode_field(&(r.capacity as i32))?;
                        encoder.encode_field(&r.active)?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectReservations { resource_id } => {
                let reservations = engine
                    .get_reservations(resource_id)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(reservations_schema());
                let rows: Vec<PgWireResult<_>> = reservations
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.resource_id.map(|u| u.to_string()))?;
                        encoder.encode_field(&r.pet_id.to_string())?;
                        encoder.encode_field(&r.customer_id.to_string())?;
                        encoder.encode_field(&r.service_id.to_string())?;
                        encoder.encode_field(&r.stay.check_in.to_string())?;
                        encoder.encode_field(&r.stay.check_out.to_string())?;
                        encoder.encode_field(&r.status.as_str())?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAvailability { category, stay } => {
                let free = engine
                    .find_available(&category, stay)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(availability_schema());
                let rows: Vec<PgWireResult<_>> = free
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.rtype.as_str())?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectFreeWindows { resource_id, stay } => {
                let windows = engine
                    .free_windows(resource_id, stay)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(free_windows_schema());
                let rid_str = resource_id.to_string();
                let rows: Vec<PgWireResult<_>> = windows
                    .into_iter()
                    .map(|w| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rid_str)?;
                        encoder.encode_field(&w.check_in.to_string())?;
                        encoder.encode_field(&w.check_out.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                let resource_id_str = channel.strip_prefix("resource_").ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected resource_{{id}})"),
                    )))
                })?;
                let _resource_id = Ulid::from_string(resource_id_str).map_err(|e| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("bad ULID in channel: {e}"),
                    )))
                })?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }

    async fn execute_with_metrics(
        &self,
        engine: &Engine,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }
}

fn resources_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("rtype".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("capacity".into(), None, None, Type::INT4, FieldFormat::Text),
        FieldInfo::new("active".into(), None, None, Type::BOOL, FieldFormat::Text),
    ]
}

fn reservations_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new(
            "resource_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new("pet_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new(
            "customer_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "service_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "start_date".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "end_date".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new("status".into(), None, None, Type::VARCHAR, FieldFormat::Text),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("rtype".into(), None, None, Type::VARCHAR, FieldFormat::Text),
    ]
}

fn free_windows_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new(
            "resource_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "start_date".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "end_date".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
    ]
}

fn batch_assignment_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new(
            "reservation_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
        FieldInfo::new("pet_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new(
            "resource_id".into(),
            None,
            None,
            Type::VARCHAR,
            FieldFormat::Text,
        ),
    ]
}

/// Pick the result schema for a statement by its shape; used by Describe in
/// the extended protocol.
fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if upper.contains("FROM AVAILABILITY") {
        availability_schema()
    } else if upper.contains("FROM FREE_WINDOWS") {
        free_windows_schema()
    } else if upper.contains("FROM RESERVATIONS") {
        reservations_schema()
    } else if upper.contains("FROM RESOURCES") {
        resources_schema()
    } else if upper.contains("RESERVATION_REQUESTS") {
        batch_assignment_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for PaddockHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_with_metrics(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct PaddockQueryParser;

#[async_trait]
impl QueryParser for PaddockQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for PaddockHandler {
    type Statement = String;
    type QueryParser = PaddockQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_with_metrics(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct PaddockFactory {
    handler: Arc<PaddockHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<PaddockAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl PaddockFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = PaddockAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(PaddockHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for PaddockFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection to completion.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(PaddockFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

/// Engine error → SQLSTATE. Conflicts surface as exclusion_violation so
/// callers can tell "taken, pick another unit" apart from plain bad input;
/// lock timeouts surface as lock_not_available, the retry-with-backoff class.
fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::Conflict { .. }
        | EngineError::CapacityExceeded { .. }
        | EngineError::NoResourceFree { .. } => "23P01",
        EngineError::LockTimeout(_) => "55P03",
        EngineError::NotFound(_) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::InUse(_) => "55006",
        EngineError::Inactive(_) => "55000",
        EngineError::InvalidTransition { .. }
        | EngineError::Validation(_)
        | EngineError::LimitExceeded(_) => "22023",
        EngineError::WalError(_) => "58030",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

/// Like [`engine_err`], plus the conflict counter for booking paths.
fn booking_err(e: EngineError) -> PgWireError {
    if matches!(
        e,
        EngineError::Conflict { .. }
            | EngineError::CapacityExceeded { .. }
            | EngineError::NoResourceFree { .. }
    ) {
        metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
    }
    engine_err(e)
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
