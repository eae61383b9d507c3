use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use oficina_auth::{
    ActivateUser, ChangePassword, CreateUser, Hs256TokenIssuer, PasswordError, Role, SuspendUser, TokenIssueError,
    TokenIssuer, User, UserCommand, hash_password, verify_password,
};
use oficina_core::{Aggregate, AggregateId, DomainError, UserId, WorkOrderId};
use oficina_events::{EventEnvelope, InMemoryEventBus};
use oficina_infra::{
    aggregate_types,
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent},
    projections::{CategoryRecord, PartRecord, ProjectionError, ReadModels, UserRecord, WorkOrderDetail, WorkOrderRecord},
    stock_service::StockMovementService,
    workers::{ProjectionWorker, WorkerHandle},
};
use oficina_inventory::{Category, CategoryCommand, CategoryId, CreateCategory, PartId};
use oficina_workorders::{
    ChangeStatus, ClientId, MechanicId, OpenWorkOrder, PartLine, ServiceLine, VehicleId, WorkOrder, WorkOrderCommand,
    WorkOrderStatus,
};

use crate::config::{AdminBootstrap, ApiConfig, Persistence};

pub type SharedStore = Arc<dyn EventStore>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedStore, SharedBus>;
pub type StockService = StockMovementService<SharedStore, SharedBus>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event store: {0}")]
    Store(#[from] EventStoreError),

    #[error("read model rebuild: {0}")]
    Projection(#[from] ProjectionError),

    #[error("projection worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error("bootstrap admin: {0}")]
    Bootstrap(String),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("e-mail ou senha inválidos")]
    InvalidCredentials,

    #[error("usuário suspenso")]
    Suspended,

    #[error(transparent)]
    Token(#[from] TokenIssueError),
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserRecord,
}

#[derive(Debug, Clone)]
pub struct NewWorkOrder {
    pub client_id: ClientId,
    pub vehicle_id: VehicleId,
    pub mechanic_id: MechanicId,
    pub status: Option<WorkOrderStatus>,
    pub problem_description: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub discount: Decimal,
    pub services: Vec<ServiceLine>,
    pub parts: Vec<PartLine>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password: String,
}

/// Everything the routes need: write paths, read models and token issuing.
///
/// Writes go through the dispatcher (or the stock service on top of it);
/// reads come from the read models. After each write the touched stream is
/// replayed into the read models so a client sees its own change on the next
/// request. The background worker applies the same envelopes; per-stream
/// cursors make the second application a no-op.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    read_models: ReadModels,
    stock: StockService,
    tokens: Hs256TokenIssuer,
    worker: Mutex<Option<WorkerHandle>>,
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, ServiceError> {
    let store: SharedStore = match &config.persistence {
        Persistence::InMemory => Arc::new(InMemoryEventStore::new()),
        Persistence::Postgres { database_url } => connect_postgres(database_url).await?,
    };
    AppServices::start(store, config)
}

#[cfg(feature = "postgres")]
async fn connect_postgres(database_url: &str) -> Result<SharedStore, ServiceError> {
    let store = oficina_infra::event_store::PostgresEventStore::connect(database_url).await?;
    store.migrate().await?;
    info!("using postgres event store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_database_url: &str) -> Result<SharedStore, ServiceError> {
    warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
    Ok(Arc::new(InMemoryEventStore::new()))
}

impl AppServices {
    /// Rebuild read models from `store`, start the projection worker and
    /// make sure the bootstrap admin exists.
    pub fn start(store: SharedStore, config: &ApiConfig) -> Result<Self, ServiceError> {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
        let read_models = ReadModels::in_memory();

        let history: Vec<_> = dispatcher.store().load_all()?.iter().map(StoredEvent::to_envelope).collect();
        info!(events = history.len(), "rebuilding read models");
        read_models.rebuild_from_scratch(history)?;

        let projections = read_models.clone();
        let worker = ProjectionWorker::spawn("oficina.projections", &bus, move |envelope: EventEnvelope<JsonValue>| {
            projections.apply_envelope(&envelope)
        })?;

        let stock = StockMovementService::new(dispatcher.clone(), read_models.parts.clone(), read_models.users.clone())
            .with_max_attempts(config.stock_max_attempts);

        let services = Self {
            dispatcher,
            read_models,
            stock,
            tokens: Hs256TokenIssuer::new(config.jwt_secret.as_bytes(), Duration::minutes(config.token_ttl_minutes)),
            worker: Mutex::new(Some(worker)),
        };
        services.bootstrap_admin(&config.admin)?;
        Ok(services)
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn stock(&self) -> &StockService {
        &self.stock
    }

    /// Stop the projection worker. Later writes still reach the store.
    pub fn shutdown(&self) {
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(worker) = worker.take() {
                worker.shutdown();
            }
        }
    }

    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: oficina_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)?;
        self.refresh(aggregate_id);
        Ok(committed)
    }

    /// Replay one stream into the read models.
    ///
    /// Failures only mean the worker has not caught up yet; it will.
    pub fn refresh(&self, aggregate_id: AggregateId) {
        let stream = match self.dispatcher.store().load_stream(aggregate_id) {
            Ok(stream) => stream,
            Err(e) => {
                debug!(%aggregate_id, error = %e, "read model refresh skipped");
                return;
            }
        };
        for stored in &stream {
            if let Err(e) = self.read_models.apply_envelope(&stored.to_envelope()) {
                debug!(%aggregate_id, error = %e, "read model refresh stopped early");
                return;
            }
        }
    }

    // -------------------------
    // Parts
    // -------------------------

    pub fn list_parts(&self, query: Option<&str>) -> Vec<PartRecord> {
        match query {
            Some(q) => self.read_models.parts.search(q),
            None => self.read_models.parts.list(),
        }
    }

    pub fn low_stock_parts(&self) -> Vec<PartRecord> {
        self.read_models.parts.low_stock()
    }

    // -------------------------
    // Categories
    // -------------------------

    pub fn list_categories(&self) -> Vec<CategoryRecord> {
        self.read_models.categories.list()
    }

    #[instrument(skip(self, description))]
    pub fn create_category(&self, name: String, description: Option<String>) -> Result<CategoryRecord, DispatchError> {
        let category_id = CategoryId::new(AggregateId::new());
        self.dispatch::<Category>(
            category_id.0,
            aggregate_types::CATEGORY,
            CategoryCommand::CreateCategory(CreateCategory {
                category_id,
                name,
                description,
                occurred_at: Utc::now(),
            }),
            |id| Category::empty(CategoryId::new(id)),
        )?;
        info!(%category_id, "category created");

        self.read_models
            .categories
            .get(&category_id)
            .ok_or_else(|| DispatchError::not_found("categoria não encontrada"))
    }

    // -------------------------
    // Work orders
    // -------------------------

    pub fn list_work_orders(&self) -> Vec<WorkOrderRecord> {
        self.read_models.work_orders.list()
    }

    /// OS with its part lines hydrated from the parts catalog.
    pub fn work_order_detail(&self, id: WorkOrderId) -> Result<WorkOrderDetail, DispatchError> {
        let parts = &self.read_models.parts;
        self.read_models
            .work_orders
            .detail(&id, |part_id| parts.get(part_id))
            .ok_or_else(|| work_order_not_found(id))
    }

    #[instrument(skip(self, new_order))]
    pub fn open_work_order(&self, new_order: NewWorkOrder) -> Result<WorkOrderRecord, DispatchError> {
        for line in &new_order.parts {
            self.stock.get_part(line.part_id)?;
        }

        let work_order_id = WorkOrderId::new();
        self.dispatch::<WorkOrder>(
            work_order_id.into(),
            aggregate_types::WORK_ORDER,
            WorkOrderCommand::OpenWorkOrder(OpenWorkOrder {
                work_order_id,
                client_id: new_order.client_id,
                vehicle_id: new_order.vehicle_id,
                mechanic_id: new_order.mechanic_id,
                status: new_order.status,
                problem_description: new_order.problem_description,
                notes: new_order.notes,
                payment_method: new_order.payment_method,
                discount: new_order.discount,
                services: new_order.services,
                parts: new_order.parts,
                occurred_at: Utc::now(),
            }),
            |_| WorkOrder::empty(work_order_id),
        )?;
        info!(%work_order_id, "work order opened");

        self.read_models
            .work_orders
            .get(&work_order_id)
            .ok_or_else(|| work_order_not_found(work_order_id))
    }

    #[instrument(skip(self))]
    pub fn change_work_order_status(
        &self,
        work_order_id: WorkOrderId,
        status: WorkOrderStatus,
    ) -> Result<WorkOrderRecord, DispatchError> {
        self.dispatch::<WorkOrder>(
            work_order_id.into(),
            aggregate_types::WORK_ORDER,
            WorkOrderCommand::ChangeStatus(ChangeStatus {
                work_order_id,
                status,
                occurred_at: Utc::now(),
            }),
            |_| WorkOrder::empty(work_order_id),
        )
        .map_err(|e| match e {
            DispatchError::NotFound(_) => work_order_not_found(work_order_id),
            other => other,
        })?;

        self.read_models
            .work_orders
            .get(&work_order_id)
            .ok_or_else(|| work_order_not_found(work_order_id))
    }

    // -------------------------
    // Users
    // -------------------------

    pub fn list_users(&self) -> Vec<UserRecord> {
        self.read_models.users.list()
    }

    pub fn user(&self, user_id: &UserId) -> Option<UserRecord> {
        self.read_models.users.get(user_id)
    }

    #[instrument(skip(self, password))]
    pub fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, LoginError> {
        let user = self
            .read_models
            .users
            .by_email(email)
            .ok_or(LoginError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(LoginError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(LoginError::Suspended);
        }

        let now = Utc::now();
        let token = self
            .tokens
            .issue(user.id, &user.display_name, vec![user.role.clone()], now)?;
        info!(user_id = %user.id, "login");
        Ok(LoginOutcome {
            token,
            expires_at: now + self.tokens.ttl(),
            user,
        })
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub fn create_user(&self, new_user: NewUser) -> Result<UserRecord, DispatchError> {
        self.create_user_with(new_user, true)
    }

    fn create_user_with(&self, new_user: NewUser, must_change_password: bool) -> Result<UserRecord, DispatchError> {
        if self.read_models.users.by_email(&new_user.email).is_some() {
            return Err(DispatchError::Conflict(format!(
                "e-mail já cadastrado: {}",
                new_user.email.trim()
            )));
        }
        let password_hash = hash_password(&new_user.password).map_err(password_error)?;

        let user_id = UserId::new();
        self.dispatch::<User>(
            user_id.into(),
            aggregate_types::USER,
            UserCommand::Create(CreateUser {
                user_id,
                email: new_user.email,
                display_name: new_user.display_name,
                role: new_user.role,
                password_hash,
                must_change_password,
                occurred_at: Utc::now(),
            }),
            |_| User::empty(user_id),
        )?;
        info!(%user_id, "user created");

        self.user(&user_id).ok_or_else(user_not_found)
    }

    /// `current` may be omitted only while the account is flagged to change its password.
    #[instrument(skip(self, current, new_password))]
    pub fn change_password(
        &self,
        user_id: UserId,
        current: Option<&str>,
        new_password: &str,
    ) -> Result<(), DispatchError> {
        let user: User = self
            .dispatcher
            .load(user_id.into(), aggregate_types::USER, |_| User::empty(user_id))
            .map_err(map_user_not_found)?;
        if !user.exists() {
            return Err(user_not_found());
        }
        if !user.must_change_password() {
            let current = current.ok_or_else(|| DispatchError::Validation("senha atual é obrigatória".to_string()))?;
            if !verify_password(current, user.password_hash()) {
                return Err(DispatchError::Validation("senha atual incorreta".to_string()));
            }
        }
        let password_hash = hash_password(new_password).map_err(password_error)?;

        self.dispatch::<User>(
            user_id.into(),
            aggregate_types::USER,
            UserCommand::ChangePassword(ChangePassword {
                user_id,
                password_hash,
                occurred_at: Utc::now(),
            }),
            |_| User::empty(user_id),
        )?;
        Ok(())
    }

    #[instrument(skip(self, reason))]
    pub fn suspend_user(&self, actor: UserId, user_id: UserId, reason: String) -> Result<UserRecord, DispatchError> {
        self.dispatch::<User>(
            user_id.into(),
            aggregate_types::USER,
            UserCommand::Suspend(SuspendUser {
                user_id,
                actor,
                reason,
                occurred_at: Utc::now(),
            }),
            |_| User::empty(user_id),
        )
        .map_err(map_user_not_found)?;
        self.user(&user_id).ok_or_else(user_not_found)
    }

    #[instrument(skip(self))]
    pub fn activate_user(&self, user_id: UserId) -> Result<UserRecord, DispatchError> {
        self.dispatch::<User>(
            user_id.into(),
            aggregate_types::USER,
            UserCommand::Activate(ActivateUser {
                user_id,
                occurred_at: Utc::now(),
            }),
            |_| User::empty(user_id),
        )
        .map_err(map_user_not_found)?;
        self.user(&user_id).ok_or_else(user_not_found)
    }

    fn bootstrap_admin(&self, admin: &AdminBootstrap) -> Result<(), ServiceError> {
        if self.read_models.users.by_email(&admin.email).is_some() {
            return Ok(());
        }
        let created = self
            .create_user_with(
                NewUser {
                    email: admin.email.clone(),
                    display_name: admin.name.clone(),
                    role: Role::admin(),
                    password: admin.password.clone(),
                },
                admin.must_change_password,
            )
            .map_err(|e| ServiceError::Bootstrap(e.to_string()))?;
        info!(user_id = %created.id, email = %created.email, "bootstrap admin created");
        Ok(())
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work_order_not_found(id: WorkOrderId) -> DispatchError {
    DispatchError::not_found(format!("OS não encontrada: {id}"))
}

fn user_not_found() -> DispatchError {
    DispatchError::not_found("usuário não encontrado")
}

fn map_user_not_found(err: DispatchError) -> DispatchError {
    match err {
        DispatchError::NotFound(_) => user_not_found(),
        other => other,
    }
}

fn password_error(err: PasswordError) -> DispatchError {
    match err {
        PasswordError::TooShort => DispatchError::Validation(err.to_string()),
        PasswordError::Hashing(msg) => DispatchError::Store(EventStoreError::Backend(msg)),
    }
}

/// Parse a path id into an aggregate id.
pub fn parse_aggregate_id(raw: &str) -> Option<AggregateId> {
    raw.parse().ok()
}

pub fn parse_part_id(raw: &str) -> Option<PartId> {
    parse_aggregate_id(raw).map(PartId::new)
}
