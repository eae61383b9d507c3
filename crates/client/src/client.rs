//! HTTP client for the workshop API.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use oficina_core::WorkOrderId;
use oficina_inventory::PartId;

use crate::error::ErrorBody;
use crate::types::{
    Ack, Category, CategoryList, EntryForm, Envelope, ExitForm, History, HistoryMovement, LoginData,
    MovementData, MovementReceipt, Part, PartDetail, PartList, WorkOrder, WorkOrderList,
};
use crate::{ClientConfig, ClientError, Session, SessionUser};

/// Called after the server rejects the session with 401. The client has
/// already dropped its session by then; what to show next is up to the caller.
pub type AuthFailureHook = Arc<dyn Fn() + Send + Sync>;

/// Outcome of a submission together with the part list fetched right after it.
#[derive(Debug)]
pub struct Reloaded<T> {
    pub outcome: Result<T, ClientError>,
    pub parts: Result<Vec<Part>, ClientError>,
}

pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: RwLock<Option<Session>>,
    on_auth_failure: AuthFailureHook,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        session: Option<Session>,
        on_auth_failure: AuthFailureHook,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            session: RwLock::new(session),
            on_auth_failure,
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn logout(&self) {
        self.set_session(None);
    }

    fn token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token().to_string())
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, authenticated: bool) -> Result<T, ClientError> {
        let request = match (authenticated, self.token()) {
            (true, Some(token)) => request.bearer_auth(token),
            _ => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.json::<ErrorBody>().await.ok();
        debug!(%status, "request rejected");
        if authenticated && status == StatusCode::UNAUTHORIZED {
            warn!("session rejected by server; clearing it");
            self.set_session(None);
            (self.on_auth_failure)();
        }
        Err(ClientError::from_status(status, body))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.http.get(self.config.url(path)), true).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.execute(self.http.post(self.config.url(path)).json(body), true).await
    }

    // -------------------------
    // Session
    // -------------------------

    /// Log in and keep the resulting session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let request = self
            .http
            .post(self.config.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "senha": password }));
        let envelope: Envelope<LoginData> = self.execute(request, false).await?;

        let data = envelope.dados;
        let session = Session::new(data.token, data.usuario, data.expira_em);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    pub async fn me(&self) -> Result<SessionUser, ClientError> {
        self.get("/auth/me").await
    }

    pub async fn change_password(&self, current: Option<&str>, new_password: &str) -> Result<String, ClientError> {
        let ack: Ack = self
            .post(
                "/auth/trocar-senha",
                &serde_json::json!({ "senha_atual": current, "nova_senha": new_password }),
            )
            .await?;
        Ok(ack.mensagem)
    }

    // -------------------------
    // Parts and stock
    // -------------------------

    pub async fn parts(&self, query: Option<&str>) -> Result<Vec<Part>, ClientError> {
        let mut request = self.http.get(self.config.url("/pecas"));
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            request = request.query(&[("q", q)]);
        }
        let list: PartList = self.execute(request, true).await?;
        Ok(list.pecas)
    }

    pub async fn low_stock_parts(&self) -> Result<Vec<Part>, ClientError> {
        let list: PartList = self.get("/pecas/estoque-baixo").await?;
        Ok(list.pecas)
    }

    pub async fn part(&self, id: PartId) -> Result<Part, ClientError> {
        let detail: PartDetail = self.get(&format!("/pecas/{id}")).await?;
        Ok(detail.peca)
    }

    pub async fn record_entry(&self, form: &EntryForm) -> Result<MovementReceipt, ClientError> {
        let envelope: Envelope<MovementData> = self.post("/pecas/entrada", form).await?;
        Ok(MovementReceipt::from_envelope(envelope))
    }

    pub async fn record_exit(&self, form: &ExitForm) -> Result<MovementReceipt, ClientError> {
        let envelope: Envelope<MovementData> = self.post("/pecas/saida", form).await?;
        Ok(MovementReceipt::from_envelope(envelope))
    }

    /// Newest first.
    pub async fn history(&self, id: PartId) -> Result<Vec<HistoryMovement>, ClientError> {
        let history: History = self.get(&format!("/pecas/{id}/historico")).await?;
        Ok(history.movimentacoes)
    }

    /// Await `submission`, then fetch the part list whatever happened, so the
    /// screen shows server state rather than a guess.
    pub async fn reload_after<T, F>(&self, submission: F) -> Reloaded<T>
    where
        F: std::future::Future<Output = Result<T, ClientError>>,
    {
        let outcome = submission.await;
        if let Err(err) = &outcome {
            debug!(error = %err, "submission failed; reloading parts");
        }
        let parts = self.parts(None).await;
        Reloaded { outcome, parts }
    }

    // -------------------------
    // Categories and work orders
    // -------------------------

    pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
        let list: CategoryList = self.get("/categorias").await?;
        Ok(list.categorias)
    }

    pub async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category, ClientError> {
        let envelope: Envelope<Category> = self
            .post("/categorias", &serde_json::json!({ "nome": name, "descricao": description }))
            .await?;
        Ok(envelope.dados)
    }

    pub async fn work_orders(&self) -> Result<Vec<WorkOrder>, ClientError> {
        let list: WorkOrderList = self.get("/os").await?;
        Ok(list.ordens)
    }

    /// Detail view; part lines come back hydrated when the part still exists.
    pub async fn work_order(&self, id: WorkOrderId) -> Result<WorkOrder, ClientError> {
        self.get(&format!("/os/{id}")).await
    }
}
