use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
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

use crate::auth::TanseeqAuthSource;
use crate::engine::Engine;
use crate::model::*;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct TanseeqHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<TanseeqQueryParser>,
}

impl TanseeqHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(TanseeqQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = crate::observability::command_label(&cmd);
        metrics::counter!(crate::observability::QUERIES_TOTAL, "command" => label).increment(1);
        let started = Instant::now();
        let result = self.dispatch(engine, cmd).await;
        metrics::histogram!(crate::observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertBooking { request } => {
                engine.create_booking(request).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateStatus {
                id,
                status,
                notes,
                actual_cost,
            } => {
                engine
                    .update_booking_status(id, status, notes, actual_cost)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::CancelBooking { id, reason } => {
                engine.cancel_booking(id, reason).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::AddReview { id, rating, review } => {
                engine
                    .add_booking_review(id, rating, review)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectBookings { project_id } => {
                let bookings = engine.bookings_for_project(&project_id).await;
                Ok(vec![booking_rows(&bookings)?])
            }
            Command::SelectConflictCheck {
                project_id,
                scheduled_date,
                start_minute,
                duration_min,
            } => {
                let clashes = engine
                    .check_booking_conflicts(&project_id, scheduled_date, start_minute, duration_min)
                    .await;
                Ok(vec![booking_rows(&clashes)?])
            }
            Command::SelectCalendar { project_id } => {
                let events = engine.calendar_events(&project_id).await;
                let schema = Arc::new(calendar_schema());
                let rows: Vec<PgWireResult<_>> = events
                    .into_iter()
                    .map(|e| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&e.booking_id.to_string())?;
                        encoder.encode_field(&e.title)?;
                        encoder.encode_field(&format_datetime(e.start))?;
                        encoder.encode_field(&format_datetime(e.end))?;
                        encoder.encode_field(&e.color)?;
                        encoder.encode_field(&e.status.as_str())?;
                        encoder.encode_field(&e.location)?;
                        encoder.encode_field(&e.estimated_cost)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectConflicts { project_id } => {
                let resolutions = engine.manage_booking_conflicts(&project_id).await;
                let schema = Arc::new(conflicts_schema());
                let rows: Vec<PgWireResult<_>> = resolutions
                    .into_iter()
                    .map(|r| {
                        let alternatives = serde_json::Value::Array(
                            r.alternatives
                                .iter()
                                .map(|a| {
                                    serde_json::json!({
                                        "date": a.date.format("%Y-%m-%d").to_string(),
                                        "start_time": format_minutes(a.start_minute),
                                        "reason": a.reason,
                                    })
                                })
                                .collect(),
                        );
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.first.id.to_string())?;
                        encoder.encode_field(&r.second.id.to_string())?;
                        encoder.encode_field(&r.first.service.as_str())?;
                        encoder.encode_field(&r.second.service.as_str())?;
                        encoder.encode_field(&r.first.scheduled_date.format("%Y-%m-%d").to_string())?;
                        encoder.encode_field(&r.resolution.as_str())?;
                        encoder.encode_field(&alternatives.to_string())?;
                        encoder.encode_field(&r.impact)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectTimeline { project_id } => {
                let timeline = engine.project_timeline(&project_id).await;
                let schema = Arc::new(timeline_schema());
                let rows: Vec<PgWireResult<_>> = timeline
                    .dependencies
                    .iter()
                    .map(|deps| {
                        let booking = timeline.bookings.iter().find(|b| b.id == deps.booking_id);
                        let adjustment = timeline
                            .adjustments
                            .iter()
                            .find(|a| a.booking_id == deps.booking_id)
                            .map(|a| a.note.clone());
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&deps.booking_id.to_string())?;
                        encoder.encode_field(&booking.map(|b| b.service.as_str()))?;
                        encoder.encode_field(
                            &booking.map(|b| b.scheduled_date.format("%Y-%m-%d").to_string()),
                        )?;
                        encoder.encode_field(&id_list_json(&deps.depends_on))?;
                        encoder.encode_field(&id_list_json(&deps.blocks))?;
                        encoder.encode_field(&adjustment)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectRecommendations { project_id } => {
                let rec = engine.recommend_schedule(&project_id).await;
                let schema = Arc::new(recommendations_schema());
                let rows: Vec<PgWireResult<_>> = rec
                    .slots
                    .iter()
                    .zip(rec.weather.iter())
                    .map(|(slot, weather)| {
                        let depends_on = serde_json::Value::Array(
                            slot.depends_on
                                .iter()
                                .map(|s| serde_json::Value::String(s.as_str().into()))
                                .collect(),
                        );
                        let advice = serde_json::Value::Array(
                            weather
                                .advice
                                .iter()
                                .map(|a| serde_json::Value::String((*a).into()))
                                .collect(),
                        );
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&slot.service.as_str())?;
                        encoder.encode_field(&slot.date.format("%Y-%m-%d").to_string())?;
                        encoder.encode_field(&format_minutes(slot.start_minute))?;
                        encoder.encode_field(&slot.priority.as_str())?;
                        encoder.encode_field(&slot.justification)?;
                        encoder.encode_field(&depends_on.to_string())?;
                        encoder.encode_field(&weather.impact)?;
                        encoder.encode_field(&advice.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectOptimization { project_id } => {
                let rec = engine.recommend_schedule(&project_id).await;
                let schema = Arc::new(optimization_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&project_id)?;
                encoder.encode_field(&(rec.slots.len() as i64))?;
                encoder.encode_field(&rec.estimate.cost_savings)?;
                encoder.encode_field(&rec.estimate.days_saved)?;
                encoder.encode_field(&(rec.estimate.efficiency_pct as i64))?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                let project_id = channel.strip_prefix("project_").ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected project_{{id}})"),
                    )))
                })?;
                if project_id.is_empty() {
                    return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        "empty project id in channel".into(),
                    ))));
                }
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }
}

// ── Row schemas ──────────────────────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("project_id", Type::VARCHAR),
        text_field("service_type", Type::VARCHAR),
        text_field("provider_id", Type::VARCHAR),
        text_field("provider_name", Type::VARCHAR),
        text_field("scheduled_date", Type::VARCHAR),
        text_field("start_time", Type::VARCHAR),
        text_field("duration_minutes", Type::INT8),
        text_field("location", Type::VARCHAR),
        text_field("instructions", Type::VARCHAR),
        text_field("details", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("estimated_cost", Type::FLOAT8),
        text_field("actual_cost", Type::FLOAT8),
        text_field("rating", Type::INT2),
        text_field("review", Type::VARCHAR),
        text_field("completion_notes", Type::VARCHAR),
    ]
}

fn calendar_schema() -> Vec<FieldInfo> {
    vec![
        text_field("booking_id", Type::VARCHAR),
        text_field("title", Type::VARCHAR),
        text_field("start", Type::VARCHAR),
        text_field("end", Type::VARCHAR),
        text_field("color", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("location", Type::VARCHAR),
        text_field("estimated_cost", Type::FLOAT8),
    ]
}

fn conflicts_schema() -> Vec<FieldInfo> {
    vec![
        text_field("first_id", Type::VARCHAR),
        text_field("second_id", Type::VARCHAR),
        text_field("first_service", Type::VARCHAR),
        text_field("second_service", Type::VARCHAR),
        text_field("scheduled_date", Type::VARCHAR),
        text_field("resolution", Type::VARCHAR),
        text_field("alternatives", Type::VARCHAR),
        text_field("impact", Type::VARCHAR),
    ]
}

fn timeline_schema() -> Vec<FieldInfo> {
    vec![
        text_field("booking_id", Type::VARCHAR),
        text_field("service_type", Type::VARCHAR),
        text_field("scheduled_date", Type::VARCHAR),
        text_field("depends_on", Type::VARCHAR),
        text_field("blocks", Type::VARCHAR),
        text_field("adjustment", Type::VARCHAR),
    ]
}

fn recommendations_schema() -> Vec<FieldInfo> {
    vec![
        text_field("service_type", Type::VARCHAR),
        text_field("scheduled_date", Type::VARCHAR),
        text_field("start_time", Type::VARCHAR),
        text_field("priority", Type::VARCHAR),
        text_field("justification", Type::VARCHAR),
        text_field("depends_on", Type::VARCHAR),
        text_field("weather_impact", Type::VARCHAR),
        text_field("weather_advice", Type::VARCHAR),
    ]
}

fn optimization_schema() -> Vec<FieldInfo> {
    vec![
        text_field("project_id", Type::VARCHAR),
        text_field("recommended_count", Type::INT8),
        text_field("cost_savings", Type::FLOAT8),
        text_field("days_saved", Type::FLOAT8),
        text_field("efficiency_pct", Type::INT8),
    ]
}

fn format_minutes(minute: Minutes) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn format_datetime(dt: chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M").to_string()
}

fn id_list_json(ids: &[ulid::Ulid]) -> String {
    serde_json::Value::Array(
        ids.iter()
            .map(|id| serde_json::Value::String(id.to_string()))
            .collect(),
    )
    .to_string()
}

fn booking_rows(bookings: &[Booking]) -> PgWireResult<Response> {
    let schema = Arc::new(bookings_schema());
    let rows: Vec<PgWireResult<_>> = bookings
        .iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.project_id)?;
            encoder.encode_field(&b.service.as_str())?;
            encoder.encode_field(&b.provider_id)?;
            encoder.encode_field(&b.provider_name)?;
            encoder.encode_field(&b.scheduled_date.format("%Y-%m-%d").to_string())?;
            encoder.encode_field(&format_minutes(b.start_minute))?;
            encoder.encode_field(&b.duration_min)?;
            encoder.encode_field(&b.location)?;
            encoder.encode_field(&b.instructions)?;
            encoder.encode_field(&b.details)?;
            encoder.encode_field(&b.status.as_str())?;
            encoder.encode_field(&b.estimated_cost)?;
            encoder.encode_field(&b.actual_cost)?;
            encoder.encode_field(&b.rating.map(i16::from))?;
            encoder.encode_field(&b.review)?;
            encoder.encode_field(&b.completion_notes)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

/// Result schema for a statement, keyed on the virtual table it reads.
fn schema_for_statement(sql: &str) -> Option<Vec<FieldInfo>> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return None;
    }
    if upper.contains("CONFLICT_CHECK") || upper.contains("BOOKINGS") {
        Some(bookings_schema())
    } else if upper.contains("CONFLICTS") {
        Some(conflicts_schema())
    } else if upper.contains("CALENDAR") {
        Some(calendar_schema())
    } else if upper.contains("TIMELINE") {
        Some(timeline_schema())
    } else if upper.contains("RECOMMENDATIONS") {
        Some(recommendations_schema())
    } else if upper.contains("OPTIMIZATION") {
        Some(optimization_schema())
    } else {
        None
    }
}

#[async_trait]
impl SimpleQueryHandler for TanseeqHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct TanseeqQueryParser;

#[async_trait]
impl QueryParser for TanseeqQueryParser {
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
        Ok(schema_for_statement(stmt).unwrap_or_default())
    }
}

#[async_trait]
impl ExtendedQueryHandler for TanseeqHandler {
    type Statement = String;
    type QueryParser = TanseeqQueryParser;

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
        let mut responses = self.execute_command(&engine, cmd).await?;
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
        let fields = schema_for_statement(&target.statement).unwrap_or_default();
        Ok(DescribeStatementResponse::new(param_types, fields))
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
        let fields = schema_for_statement(&target.statement.statement).unwrap_or_default();
        Ok(DescribePortalResponse::new(fields))
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
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
                && n > max
            {
                max = n;
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

pub struct TanseeqFactory {
    handler: Arc<TanseeqHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<TanseeqAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl TanseeqFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = TanseeqAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(TanseeqHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for TanseeqFactory {
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
) -> Result<(), std::io::Error> {
    let factory = Arc::new(TanseeqFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
