// ── Reconciliation engine ──
//
// Merges three update sources — the initial fetch, the periodic poll,
// and the push stream — into one consistent store, while the edit guard
// keeps in-flight renames from being clobbered and the command task
// applies optimistic mutations with rollback.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use iotdata_api::{
    Client as ApiClient, PermissionAction, PushFrame, PushHandle, ReconnectConfig, SaveUserRequest,
    TransportConfig,
};

use crate::command::{Command, CommandEnvelope, UserDraft};
use crate::convert;
use crate::edit::{Disclosure, EditGuard};
use crate::error::CoreError;
use crate::matrix::{AccessAction, AccessIntent};
use crate::model::{AuditEntry, User};
use crate::session::Session;
use crate::store::DataStore;

const COMMAND_CHANNEL_SIZE: usize = 32;

/// Abandoned edit sessions are swept after this long so they cannot
/// suppress polling forever.
const EDIT_SESSION_MAX_AGE: Duration = Duration::from_secs(300);

// ── Configuration ───────────────────────────────────────────────────

/// Connection and scheduling configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend root URL (e.g. `https://panel.example.com`).
    pub base_url: Url,
    /// Full-snapshot poll cadence. Zero disables the poll task.
    pub poll_interval: Duration,
    /// Maintain the push channel at `/ws`.
    pub push_enabled: bool,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:5000").expect("static URL"),
            poll_interval: Duration::from_secs(5),
            push_enabled: true,
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

// ── ConnectionState ─────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The backend rejected the credential; local session state has been
    /// cleared and the operator must sign in again.
    SessionExpired,
}

// ── Engine ──────────────────────────────────────────────────────────

/// The reconciliation engine. Cheaply cloneable via `Arc`.
///
/// [`connect()`](Self::connect) performs the initial fetch and spawns
/// the background producers (poll task, push bridge, command processor).
/// [`disconnect()`](Self::disconnect) cancels them, joins the handles,
/// and closes the push connection explicitly.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    session: Session,
    store: Arc<DataStore>,
    edit_guard: EditGuard,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current connection — cancelled on disconnect,
    /// replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    client: Mutex<Option<Arc<ApiClient>>>,
    push_handle: Mutex<Option<PushHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine for one authenticated session. Does NOT connect —
    /// call [`connect()`](Self::connect) to fetch data and start the
    /// background producers.
    pub fn new(config: EngineConfig, session: Session) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(EngineInner {
                config,
                session,
                store: Arc::new(DataStore::new()),
                edit_guard: EditGuard::new(),
                connection_state,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                client: Mutex::new(None),
                push_handle: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Observe connection-state transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect: build the API client, load the initial snapshot, and
    /// spawn the background producers.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);

        // Fresh child token for this connection (supports reconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let config = &self.inner.config;
        let transport = TransportConfig {
            timeout: config.timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let client = Arc::new(
            ApiClient::new(
                config.base_url.clone(),
                self.inner.session.token().clone(),
                &transport,
            )
            .map_err(CoreError::from)?,
        );
        *self.inner.client.lock().await = Some(Arc::clone(&client));

        // Initial load. A 401 here is fatal to the session (refresh
        // clears local state itself).
        self.refresh().await?;

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let engine = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(command_processor_task(engine, rx, cancel)));
        }

        if !config.poll_interval.is_zero() {
            let engine = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(poll_task(
                engine,
                config.poll_interval,
                cancel,
            )));
        }

        if config.push_enabled {
            self.spawn_push(&child, &mut handles).await;
        }
        drop(handles);

        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        info!(user = self.inner.session.username(), "engine connected");
        Ok(())
    }

    /// Spawn the push stream plus the bridge task that routes frames
    /// into the store. Non-fatal on failure — polling still covers the
    /// data, just without live delivery.
    async fn spawn_push(&self, cancel: &CancellationToken, handles: &mut Vec<JoinHandle<()>>) {
        let ws_url = match push_url(&self.inner.config.base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot derive push URL (push disabled)");
                return;
            }
        };

        let bearer = format!("Bearer {}", self.inner.session.token().expose_secret());
        let ws_cancel = cancel.child_token();
        let handle = PushHandle::connect(
            ws_url,
            ReconnectConfig::default(),
            ws_cancel.clone(),
            Some(bearer),
        );

        let mut frames = handle.subscribe();
        let engine = self.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = ws_cancel.cancelled() => break,
                    result = frames.recv() => {
                        match result {
                            Ok(frame) => engine.apply_push(&frame),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "push bridge lagged; poll will reconcile");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            debug!("push bridge shut down");
        }));

        *self.inner.push_handle.lock().await = Some(handle);
        info!("push stream spawned");
    }

    /// Disconnect: cancel background tasks, join them, and close the
    /// push connection. The engine can `connect()` again afterwards.
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent — allows reconnect).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(handle) = self.inner.push_handle.lock().await.take() {
            handle.shutdown();
        }

        *self.inner.client.lock().await = None;

        // Recreate the command channel so a reconnect gets a fresh
        // receiver (the old one was consumed by the processor task).
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        debug!("engine disconnected");
    }

    /// Handle a 401 from any call: clear local session state, stop the
    /// producers, and surface the terminal state.
    async fn expire_session(&self) {
        warn!("session invalidated by backend, clearing local state");
        self.inner.store.clear();
        self.inner.cancel_child.lock().await.cancel();
        if let Some(handle) = self.inner.push_handle.lock().await.take() {
            handle.shutdown();
        }
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::SessionExpired);
    }

    // ── Update ingestion ─────────────────────────────────────────────

    /// One poll cycle: fetch the full snapshot and apply it.
    ///
    /// Suppressed entirely while any edit session is active — input
    /// focus and draft text must never be overwritten mid-edit; the
    /// first tick after the session closes reconciles. A 401 clears
    /// local session state before the error is returned.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = self.refresh_inner().await;
        if let Err(ref e) = result {
            if e.is_session_expired() {
                self.expire_session().await;
            }
        }
        result
    }

    async fn refresh_inner(&self) -> Result<(), CoreError> {
        if self.inner.edit_guard.is_editing() {
            debug!("poll suppressed: rename in progress");
            return Ok(());
        }

        let client = self.api_client().await?;

        let records = client.list_messages().await.map_err(CoreError::from)?;
        let messages = records
            .into_iter()
            .map(convert::message_from_record)
            .collect();
        self.inner.store.messages.ingest(messages);

        if self.inner.session.role().elevated() {
            let data = client.master_data().await.map_err(CoreError::from)?;
            self.inner.store.devices.replace_all(
                data.devices
                    .into_iter()
                    .map(|d| (d.esn.clone(), convert::device_from_record(d)))
                    .collect(),
            );
            self.inner.store.users.replace_all(
                data.users
                    .into_iter()
                    .map(|u| (u.username.clone(), convert::user_from_record(u)))
                    .collect(),
            );
        }

        let _ = self.inner.store.last_refresh.send(Some(chrono::Utc::now()));
        Ok(())
    }

    /// Apply a single push frame to the cached state.
    ///
    /// Driven by the internal bridge task; public so alternate
    /// transports can feed the same reconciliation path.
    pub fn apply_push(&self, frame: &PushFrame) {
        match frame {
            PushFrame::DeviceUpdate { esn, name } => {
                if self.inner.edit_guard.is_editing_esn(esn) {
                    // Dropped, not queued: the first poll after the edit
                    // session closes reconciles the name.
                    debug!(esn = esn.as_str(), "push rename dropped: esn is being edited");
                    return;
                }
                debug!(esn = esn.as_str(), name = name.as_str(), "applying push rename");
                self.inner.store.messages.apply_rename(esn, Some(name));
                if let Some(device) = self.inner.store.device_by_esn(esn) {
                    let mut renamed = (*device).clone();
                    renamed.name = Some(name.clone());
                    self.inner.store.devices.upsert(esn.clone(), renamed);
                }
            }
            PushFrame::Telemetry(telemetry) => {
                let fallback = self.inner.store.messages.allocate_local_id();
                let message = convert::message_from_push(telemetry, fallback);
                debug!(esn = message.esn.as_str(), id = message.id, "prepending live message");
                self.inner.store.messages.prepend(message);
            }
        }
    }

    // ── Edit guard surface ───────────────────────────────────────────

    /// Begin renaming a device. The draft starts at the currently
    /// displayed name.
    pub fn begin_rename(&self, esn: &str) -> Result<(), CoreError> {
        let current = self
            .inner
            .store
            .group(esn)
            .and_then(|g| g.device_name)
            .or_else(|| {
                self.inner
                    .store
                    .device_by_esn(esn)
                    .and_then(|d| d.name.clone())
            })
            .unwrap_or_default();
        self.inner.edit_guard.begin(esn, &current)
    }

    /// Replace the draft text for an in-progress rename.
    pub fn update_rename_draft(&self, esn: &str, draft: &str) -> Result<(), CoreError> {
        self.inner.edit_guard.update(esn, draft)
    }

    /// The current draft, if a rename is in progress.
    pub fn rename_draft(&self, esn: &str) -> Option<String> {
        self.inner.edit_guard.draft(esn)
    }

    /// Discard an in-progress rename without any network call.
    pub fn cancel_rename(&self, esn: &str) {
        self.inner.edit_guard.cancel(esn);
    }

    /// Commit an in-progress rename: send the draft to the backend and,
    /// only on success, close the session so ingestion may overwrite the
    /// name again. On failure the session stays open and the draft is
    /// preserved for retry.
    pub async fn commit_rename(&self, esn: &str) -> Result<(), CoreError> {
        let draft = self
            .inner
            .edit_guard
            .draft(esn)
            .ok_or_else(|| CoreError::NoEditSession {
                esn: esn.to_owned(),
            })?;

        self.execute(Command::RenameDevice {
            esn: esn.to_owned(),
            name: draft,
        })
        .await?;

        self.inner.edit_guard.finish(esn);
        Ok(())
    }

    /// Flip a device's expand/collapse state; inert while it is being
    /// edited.
    pub fn toggle_expanded(&self, esn: &str) -> Disclosure {
        self.inner.edit_guard.toggle_disclosure(esn)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Rename directly (no edit session), e.g. from a one-shot CLI call.
    pub async fn rename_device(&self, esn: &str, name: &str) -> Result<(), CoreError> {
        self.execute(Command::RenameDevice {
            esn: esn.to_owned(),
            name: name.to_owned(),
        })
        .await
    }

    /// Apply a grant/revoke intent from the permission matrix.
    pub async fn set_permission(&self, intent: AccessIntent) -> Result<(), CoreError> {
        self.execute(Command::SetPermission {
            user_id: intent.user_id,
            device_id: intent.device_id,
            action: intent.action,
        })
        .await
    }

    /// Create or update a user account.
    pub async fn save_user(&self, draft: UserDraft) -> Result<(), CoreError> {
        self.execute(Command::SaveUser { draft }).await
    }

    /// Delete a user account.
    pub async fn delete_user(&self, user_id: u64) -> Result<(), CoreError> {
        self.execute(Command::DeleteUser { user_id }).await
    }

    /// Fetch the audit trail. Reads bypass the command channel.
    pub async fn audit_log(&self) -> Result<Vec<AuditEntry>, CoreError> {
        let client = self.api_client().await?;
        let records = client.audit_log().await.map_err(CoreError::from)?;
        Ok(records.into_iter().map(convert::audit_from_record).collect())
    }

    /// Route a command through the processor task and await its result.
    async fn execute(&self, command: Command) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        let envelope = CommandEnvelope { command, reply };
        self.inner
            .command_tx
            .lock()
            .await
            .send(envelope)
            .await
            .map_err(|_| CoreError::NotConnected)?;
        rx.await.map_err(|_| CoreError::NotConnected)?
    }

    async fn api_client(&self) -> Result<Arc<ApiClient>, CoreError> {
        self.inner
            .client
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(CoreError::NotConnected)
    }

    // ── Command execution (optimistic apply → call → rollback) ───────

    async fn run_command(&self, command: Command) -> Result<(), CoreError> {
        let client = self.api_client().await?;
        let store = &self.inner.store;

        let result = match command {
            Command::RenameDevice { esn, name } => {
                // Snapshot pre-mutation state for rollback.
                let prior_group_name = store.group(&esn).and_then(|g| g.device_name);
                let prior_device = store.device_by_esn(&esn);

                // Optimistic apply: whole-record swaps, zero latency.
                store.messages.apply_rename(&esn, Some(&name));
                if let Some(ref device) = prior_device {
                    let mut renamed = (**device).clone();
                    renamed.name = Some(name.clone());
                    store.devices.upsert(esn.clone(), renamed);
                }

                match client.update_device(&esn, &name).await {
                    Ok(()) => Ok::<(), CoreError>(()),
                    Err(e) => {
                        // Revert to the pre-optimistic values.
                        store
                            .messages
                            .apply_rename(&esn, prior_group_name.as_deref());
                        if let Some(device) = prior_device {
                            store.devices.upsert(esn.clone(), (*device).clone());
                        }
                        Err(e.into())
                    }
                }
            }

            Command::SetPermission {
                user_id,
                device_id,
                action,
            } => {
                let user = store
                    .user_by_id(user_id)
                    .ok_or(CoreError::UserNotFound { id: user_id })?;
                let prior = store
                    .device_by_id(device_id)
                    .ok_or(CoreError::DeviceIdNotFound { id: device_id })?;

                let flipped = match action {
                    AccessAction::Grant => prior.with_grant(&user.username),
                    AccessAction::Revoke => prior.with_revocation(&user.username),
                };
                store.devices.upsert(prior.esn.clone(), flipped);

                let wire_action = match action {
                    AccessAction::Grant => PermissionAction::Grant,
                    AccessAction::Revoke => PermissionAction::Revoke,
                };
                match client.set_permission(user_id, device_id, wire_action).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        store.devices.upsert(prior.esn.clone(), (*prior).clone());
                        Err(e.into())
                    }
                }
            }

            Command::SaveUser { draft } => {
                let prior = draft.id.and_then(|id| store.user_by_id(id));
                let optimistic = user_from_draft(&draft);
                let key = optimistic.username.clone();

                // A rename of the account changes its cache key.
                if let Some(ref prior_user) = prior {
                    if prior_user.username != key {
                        store.users.remove(&prior_user.username);
                    }
                }
                store.users.upsert(key.clone(), optimistic);

                match client.save_user(&save_request(&draft)).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        store.users.remove(&key);
                        if let Some(prior_user) = prior {
                            store
                                .users
                                .upsert(prior_user.username.clone(), (*prior_user).clone());
                        }
                        Err(e.into())
                    }
                }
            }

            Command::DeleteUser { user_id } => {
                let prior = store
                    .user_by_id(user_id)
                    .ok_or(CoreError::UserNotFound { id: user_id })?;
                store.users.remove(&prior.username);

                match client.delete_user(user_id).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        store.users.upsert(prior.username.clone(), (*prior).clone());
                        Err(e.into())
                    }
                }
            }
        };

        if let Err(ref e) = result {
            if e.is_session_expired() {
                self.expire_session().await;
            }
        }
        result
    }
}

/// Derive the push URL from the backend base: http→ws, https→wss, `/ws`.
fn push_url(base: &Url) -> Result<Url, CoreError> {
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let host = base.host_str().ok_or_else(|| CoreError::Config {
        message: "base URL has no host".into(),
    })?;
    let raw = match base.port() {
        Some(port) => format!("{scheme}://{host}:{port}/ws"),
        None => format!("{scheme}://{host}/ws"),
    };
    Url::parse(&raw).map_err(|e| CoreError::Config {
        message: format!("invalid push URL: {e}"),
    })
}

fn user_from_draft(draft: &UserDraft) -> User {
    User {
        // Creates get their real id from the next poll; 0 is a
        // placeholder that cannot collide with cached accounts.
        id: draft.id.unwrap_or(0),
        username: draft.username.clone(),
        full_name: draft.full_name.clone(),
        role: draft.role,
        email: draft.email.clone(),
        phone: draft.phone.clone(),
        address: draft.address.clone(),
        city: draft.city.clone(),
        state: draft.state.clone(),
    }
}

fn save_request(draft: &UserDraft) -> SaveUserRequest {
    SaveUserRequest {
        id: draft.id,
        username: draft.username.clone(),
        password: draft
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned()),
        role: draft.role.to_string(),
        full_name: draft.full_name.clone(),
        email: draft.email.clone(),
        phone: draft.phone.clone(),
        address: draft.address.clone(),
        city: draft.city.clone(),
        state: draft.state.clone(),
    }
}

// ── Background tasks ────────────────────────────────────────────────

/// Periodic full-snapshot poll. Skipped while an edit is in flight;
/// transient failures wait for the next tick.
async fn poll_task(engine: Engine, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                for esn in engine.inner.edit_guard.expire(EDIT_SESSION_MAX_AGE) {
                    warn!(esn = esn.as_str(), "edit session timed out, discarding draft");
                }

                match engine.refresh().await {
                    Ok(()) => {}
                    // refresh() already cleared session state.
                    Err(e) if e.is_session_expired() => break,
                    Err(e) => {
                        // Non-fatal: the next tick retries.
                        debug!(error = %e, "poll failed");
                    }
                }
            }
        }
    }
    debug!("poll task shut down");
}

/// Single consumer for all mutations — commands run one at a time, so
/// each optimistic apply/rollback pair is atomic at the store level.
async fn command_processor_task(
    engine: Engine,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = engine.run_command(envelope.command).await;
                let _ = envelope.reply.send(result);
            }
        }
    }
    debug!("command processor shut down");
}
