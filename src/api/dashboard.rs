//! Dashboard API
//!
//! Typed queries that subscribe through the query cache, and mutations that
//! go through the invalidation bus.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::api::transport::{decode, Transport};
use crate::cache::{Entity, Filters, Fingerprint, QueryCache, QueryOptions, Subscription};
use crate::config::Config;
use crate::error::{FetchError, Result, SyncError};
use crate::invalidation::{InvalidationBus, MutationKind};
use crate::models::{
    Ack, Feature, FeatureUpdate, NewFeature, Notification, NotificationPage, Page, Panel,
    PanelInput, Session, SessionInput, UnreadCount,
};

/// Aggregate key of the unread notification counter
pub const UNREAD_COUNT: &str = "unread-count";

/// API path of a list query.
pub fn list_path(entity: Entity, filters: &Filters) -> String {
    if filters.is_empty() {
        format!("/api/{}", entity.namespace())
    } else {
        format!("/api/{}?{}", entity.namespace(), filters.to_query_string())
    }
}

/// API path of a single record.
pub fn detail_path(entity: Entity, id: &str) -> String {
    let id: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
    format!("/api/{}/{}", entity.namespace(), id)
}

// == Dashboard API ==
#[derive(Clone)]
pub struct DashboardApi {
    transport: Arc<dyn Transport>,
    cache: QueryCache,
    bus: InvalidationBus,
    options: QueryOptions,
    notifications_poll: Duration,
}

impl std::fmt::Debug for DashboardApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardApi")
            .field("options", &self.options)
            .field("notifications_poll", &self.notifications_poll)
            .finish_non_exhaustive()
    }
}

impl DashboardApi {
    pub fn new(transport: Arc<dyn Transport>, cache: QueryCache, config: &Config) -> Self {
        Self {
            transport,
            bus: InvalidationBus::new(cache.clone()),
            cache,
            options: config.query_options(),
            notifications_poll: config.notifications_poll(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// Window-focus signal: revalidates every visible stale query.
    pub fn focus(&self) -> usize {
        self.cache.focus()
    }

    fn query<T>(&self, fingerprint: Fingerprint, path: String, options: QueryOptions) -> Subscription<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let transport = Arc::clone(&self.transport);
        self.cache.get(
            fingerprint,
            move || {
                let transport = Arc::clone(&transport);
                let path = path.clone();
                async move { decode::<T>(transport.get_json(&path).await?) }
            },
            options,
        )
    }

    fn list<T>(&self, entity: Entity, filters: &Filters, options: QueryOptions) -> Subscription<Page<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.query(
            Fingerprint::list(entity, filters),
            list_path(entity, filters),
            options,
        )
    }

    fn detail<T>(&self, entity: Entity, id: &str) -> Subscription<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.query(
            Fingerprint::detail(entity, id),
            detail_path(entity, id),
            self.options,
        )
    }

    fn polled(&self) -> QueryOptions {
        self.options.refetch_interval(self.notifications_poll)
    }

    // == Queries ==
    pub fn features(&self, filters: &Filters) -> Subscription<Page<Feature>> {
        self.list(Entity::Features, filters, self.options)
    }

    pub fn feature(&self, id: &str) -> Subscription<Feature> {
        self.detail(Entity::Features, id)
    }

    /// Notification list, polled while subscribed.
    pub fn notifications(&self, filters: &Filters) -> Subscription<NotificationPage> {
        let entity = Entity::Notifications;
        self.query(
            Fingerprint::list(entity, filters),
            list_path(entity, filters),
            self.polled(),
        )
    }

    pub fn notification(&self, id: &str) -> Subscription<Notification> {
        self.detail(Entity::Notifications, id)
    }

    /// Unread counter, polled while subscribed.
    pub fn unread_count(&self) -> Subscription<UnreadCount> {
        let entity = Entity::Notifications;
        self.query(
            Fingerprint::aggregate(entity, UNREAD_COUNT),
            format!("/api/{}/{}", entity.namespace(), UNREAD_COUNT),
            self.polled(),
        )
    }

    pub fn panels(&self, filters: &Filters) -> Subscription<Page<Panel>> {
        self.list(Entity::Panels, filters, self.options)
    }

    pub fn panel(&self, id: &str) -> Subscription<Panel> {
        self.detail(Entity::Panels, id)
    }

    pub fn sessions(&self, filters: &Filters) -> Subscription<Page<Session>> {
        self.list(Entity::Sessions, filters, self.options)
    }

    pub fn session(&self, id: &str) -> Subscription<Session> {
        self.detail(Entity::Sessions, id)
    }

    // == Mutations ==
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> std::result::Result<T, FetchError> {
        decode(self.transport.send_json(method, &path, body).await?)
    }

    async fn acknowledge(&self, path: String) -> std::result::Result<Ack, FetchError> {
        let value = self.transport.send_json(Method::POST, &path, None).await?;
        if value.is_null() {
            return Ok(Ack::default());
        }
        decode(value)
    }

    async fn write<B, T>(
        &self,
        kind: MutationKind,
        target: Option<&str>,
        method: Method,
        path: String,
        input: &B,
    ) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(input)
            .map_err(|e| SyncError::InvalidRequest(format!("Unserializable body: {e}")))?;
        let response = self
            .bus
            .mutate(kind, target, self.send(method, path, Some(body)))
            .await?;
        Ok(response)
    }

    pub async fn create_feature(&self, input: &NewFeature) -> Result<Feature> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::CreateFeature,
            None,
            Method::POST,
            list_path(Entity::Features, &Filters::new()),
            input,
        )
        .await
    }

    pub async fn update_feature(&self, id: &str, input: &FeatureUpdate) -> Result<Feature> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::UpdateFeature,
            Some(id),
            Method::PUT,
            detail_path(Entity::Features, id),
            input,
        )
        .await
    }

    pub async fn create_panel(&self, input: &PanelInput) -> Result<Panel> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::CreatePanel,
            None,
            Method::POST,
            list_path(Entity::Panels, &Filters::new()),
            input,
        )
        .await
    }

    pub async fn update_panel(&self, id: &str, input: &PanelInput) -> Result<Panel> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::UpdatePanel,
            Some(id),
            Method::PUT,
            detail_path(Entity::Panels, id),
            input,
        )
        .await
    }

    pub async fn create_session(&self, input: &SessionInput) -> Result<Session> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::CreateSession,
            None,
            Method::POST,
            list_path(Entity::Sessions, &Filters::new()),
            input,
        )
        .await
    }

    pub async fn update_session(&self, id: &str, input: &SessionInput) -> Result<Session> {
        reject_invalid(input.validate())?;
        self.write(
            MutationKind::UpdateSession,
            Some(id),
            Method::PUT,
            detail_path(Entity::Sessions, id),
            input,
        )
        .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Ack> {
        if id.trim().is_empty() {
            return Err(SyncError::InvalidRequest(
                "Notification id cannot be empty".to_string(),
            ));
        }
        let path = format!("{}/read", detail_path(Entity::Notifications, id));
        let ack = self
            .bus
            .mutate(
                MutationKind::MarkNotificationRead,
                Some(id),
                self.acknowledge(path),
            )
            .await?;
        Ok(ack)
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Ack> {
        let path = format!("/api/{}/read-all", Entity::Notifications.namespace());
        let ack = self
            .bus
            .mutate(
                MutationKind::MarkAllNotificationsRead,
                None,
                self.acknowledge(path),
            )
            .await?;
        Ok(ack)
    }
}

fn reject_invalid(message: Option<String>) -> Result<()> {
    match message {
        Some(message) => Err(SyncError::InvalidRequest(message)),
        None => Ok(()),
    }
}
