//! REST client for a hosted realtime database.
//!
//! # Protocol
//!
//! - `PUT /Products/{id}.json` - write a full record under a locally generated push key
//! - `DELETE /Products/{id}.json` - remove a record (succeeds for missing keys)
//! - `GET /Products.json` with `Accept: text/event-stream` - live snapshot stream
//! - `orderBy="userId"&equalTo="{uid}"` - server-side owner filter
//! - `auth={token}` - ID token of the signed-in user, when configured

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::instrument;
use url::Url;

use tradepost_core::{Product, ProductDraft, ProductId, UserId};

use super::event_stream::{EventStreamParser, Snapshot, StoreEvent};
use super::{
    BookmarkRepository, ProductFilter, ProductRepository, PushIdGenerator, StoreError, Subscription,
};
use crate::config::DatabaseConfig;

const PRODUCTS_PATH: &str = "Products";

/// Realtime database client implementing both repositories.
#[derive(Clone)]
pub struct RealtimeDatabase {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<SecretString>,
    push_ids: Arc<PushIdGenerator>,
}

impl RealtimeDatabase {
    /// Create a new realtime database client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &DatabaseConfig, user_agent: &str) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            auth_token: config.auth_token.clone(),
            push_ids: Arc::new(PushIdGenerator::new()),
        })
    }

    /// Build the REST URL for a database path.
    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self.base_url.join(&format!("{path}.json"))?;
        if !query.is_empty() || self.auth_token.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(token) = &self.auth_token {
                pairs.append_pair("auth", token.expose_secret());
            }
        }
        Ok(url)
    }

    /// Open a streaming read; yields the full snapshot after every event.
    ///
    /// The returned closure cancels the stream.
    fn live(
        &self,
        url: Result<Url, StoreError>,
    ) -> (
        impl Stream<Item = Value> + Send + 'static,
        impl FnOnce() + Send + 'static,
    ) {
        let client = self.client.clone();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let snapshots = async_stream::stream! {
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot build subscription URL");
                    return;
                }
            };
            let path = url.path().to_owned();

            let request = client.get(url).header(ACCEPT, "text/event-stream").send();
            let response = tokio::select! {
                _ = &mut cancel_rx => return,
                response = request => response,
            };
            let response = match response.map_err(StoreError::from) {
                Ok(response) => match check_status(response).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(path = %path, error = %e, "Subscription rejected");
                        return;
                    }
                },
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Subscription request failed");
                    return;
                }
            };
            tracing::debug!(path = %path, "Subscription open");

            let events = apply_events(response.bytes_stream(), cancel_rx, path);
            let mut events = std::pin::pin!(events);
            while let Some(value) = events.next().await {
                yield value;
            }
        };

        let cancel = move || {
            let _ = cancel_tx.send(());
        };
        (snapshots, cancel)
    }
}

#[async_trait]
impl ProductRepository for RealtimeDatabase {
    #[instrument(skip(self, draft), fields(product_id = tracing::field::Empty))]
    async fn create(&self, draft: ProductDraft) -> Result<ProductId, StoreError> {
        let product_id = self.push_ids.next_id();
        tracing::Span::current().record("product_id", product_id.as_str());

        let product = draft.into_product(product_id.clone());
        let url = self.url(&product_path(&product_id), &[])?;

        let response = self.client.put(url).json(&product).send().await?;
        check_status(response).await?;

        Ok(product_id)
    }

    #[instrument(skip(self))]
    async fn delete(&self, product_id: &ProductId) -> Result<(), StoreError> {
        let url = self.url(&product_path(product_id), &[])?;
        let response = self.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn subscribe(&self, filter: ProductFilter) -> Subscription<Vec<Product>> {
        let query = match &filter {
            ProductFilter::All => Vec::new(),
            ProductFilter::Owner(user) => vec![
                ("orderBy", "\"userId\"".to_owned()),
                ("equalTo", Value::String(user.to_string()).to_string()),
            ],
        };
        let (snapshots, cancel) = self.live(self.url(PRODUCTS_PATH, &query));
        let updates = snapshots.map(move |value| products_from_snapshot(value, &filter));
        Subscription::new(updates, cancel)
    }
}

impl BookmarkRepository for RealtimeDatabase {
    fn subscribe(&self, user: &UserId) -> Subscription<BTreeSet<ProductId>> {
        let path = format!("Users/{}/Bookmarks", urlencoding::encode(user.as_str()));
        let (snapshots, cancel) = self.live(self.url(&path, &[]));
        Subscription::new(snapshots.map(bookmarks_from_snapshot), cancel)
    }
}

/// Apply a `text/event-stream` body to a local snapshot, yielding the full
/// snapshot after every `put` or `patch`.
///
/// Ends when the body ends or fails, when the store closes the stream, or
/// when `cancel` fires.
fn apply_events<S, B, E>(
    body: S,
    mut cancel: oneshot::Receiver<()>,
    path: String,
) -> impl Stream<Item = Value> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut parser = EventStreamParser::default();
        let mut snapshot = Snapshot::default();

        'events: loop {
            let chunk = tokio::select! {
                _ = &mut cancel => break 'events,
                chunk = body.next() => chunk,
            };
            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    tracing::error!(path = %path, error = %e, "Subscription stream failed");
                    break 'events;
                }
                None => {
                    tracing::warn!(path = %path, "Subscription stream ended by server");
                    break 'events;
                }
            };

            for raw in parser.feed(bytes.as_ref()) {
                match StoreEvent::parse(&raw) {
                    Ok(StoreEvent::Put { path: at, data }) => {
                        snapshot.put(&at, data);
                        yield snapshot.value().clone();
                    }
                    Ok(StoreEvent::Patch { path: at, data }) => {
                        snapshot.patch(&at, data);
                        yield snapshot.value().clone();
                    }
                    Ok(StoreEvent::KeepAlive) => {}
                    Ok(StoreEvent::Closed(reason)) => {
                        let e = StoreError::StreamClosed(reason);
                        tracing::error!(path = %path, error = %e, "Subscription closed");
                        break 'events;
                    }
                    Ok(StoreEvent::Ignored(event)) => {
                        tracing::debug!(path = %path, event = %event, "Ignoring stream event");
                    }
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Malformed stream event");
                    }
                }
            }
        }
        tracing::debug!(path = %path, "Subscription closed");
    }
}

fn product_path(product_id: &ProductId) -> String {
    format!("{PRODUCTS_PATH}/{}", urlencoding::encode(product_id.as_str()))
}

/// Fail on non-success statuses, keeping the body as the error message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decode a `Products` snapshot; records that do not parse are skipped.
///
/// Keys are push keys, so the map's key order is insertion order.
fn products_from_snapshot(value: Value, filter: &ProductFilter) -> Vec<Product> {
    let Value::Object(records) = value else {
        return Vec::new();
    };
    records
        .into_iter()
        .filter_map(|(key, record)| match serde_json::from_value::<Product>(record) {
            Ok(product) => Some(product),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping malformed product record");
                None
            }
        })
        .filter(|product| filter.matches(product))
        .collect()
}

/// Decode a `Users/{uid}/Bookmarks` snapshot: its keys are the product ids.
fn bookmarks_from_snapshot(value: Value) -> BTreeSet<ProductId> {
    match value {
        Value::Object(entries) => entries.into_iter().map(|(key, _)| ProductId::new(key)).collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn database(token: Option<&str>) -> RealtimeDatabase {
        let config = DatabaseConfig {
            url: Url::parse("https://my-app.firebaseio.com/").unwrap(),
            auth_token: token.map(SecretString::from),
        };
        RealtimeDatabase::new(&config, "tradepost-test").unwrap()
    }

    fn record(id: &str, user: &str) -> Value {
        json!({
            "productId": id,
            "imageUrl": ["https://cdn.test/1.png"],
            "name": "Kite",
            "description": "Red",
            "price": "5",
            "category": "Toy",
            "location": "Austin",
            "coordinates": { "lat": 30.2, "lon": -97.7 },
            "userId": user
        })
    }

    fn chunk(event: &str, data: &str) -> Result<Vec<u8>, std::io::Error> {
        Ok(format!("event: {event}\ndata: {data}\n\n").into_bytes())
    }

    async fn collect_events(chunks: Vec<Result<Vec<u8>, std::io::Error>>) -> Vec<Value> {
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let body = futures::stream::iter(chunks);
        apply_events(body, cancel_rx, "/Products.json".to_owned())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_put_then_patch_yield_full_snapshots() {
        let snapshots = collect_events(vec![
            chunk("put", r#"{"path":"/","data":{"-N1":{"name":"Kite","price":"5"}}}"#),
            chunk("keep-alive", "null"),
            chunk("patch", r#"{"path":"/-N1","data":{"price":"7"}}"#),
        ])
        .await;

        assert_eq!(
            snapshots,
            vec![
                json!({ "-N1": { "name": "Kite", "price": "5" } }),
                json!({ "-N1": { "name": "Kite", "price": "7" } }),
            ]
        );
    }

    #[tokio::test]
    async fn test_keep_alive_yields_nothing() {
        let snapshots = collect_events(vec![chunk("keep-alive", "null")]).await;
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let snapshots = collect_events(vec![
            Ok(b"event: put\ndata: {\"path\":\"/\",".to_vec()),
            Ok(b"\"data\":{\"-N1\":true}}\n\n".to_vec()),
        ])
        .await;

        assert_eq!(snapshots, vec![json!({ "-N1": true })]);
    }

    #[tokio::test]
    async fn test_auth_revoked_ends_stream() {
        let snapshots = collect_events(vec![
            chunk("put", r#"{"path":"/","data":{"-N1":true}}"#),
            chunk("auth_revoked", "credential is no longer valid"),
            chunk("put", r#"{"path":"/-N2","data":true}"#),
        ])
        .await;

        assert_eq!(snapshots, vec![json!({ "-N1": true })]);
    }

    #[tokio::test]
    async fn test_body_error_ends_stream() {
        let snapshots = collect_events(vec![
            chunk("put", r#"{"path":"/","data":{"-N1":true}}"#),
            Err(std::io::Error::other("connection reset")),
            chunk("put", r#"{"path":"/-N2","data":true}"#),
        ])
        .await;

        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_ends_open_stream() {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let body = futures::stream::iter(vec![chunk("put", r#"{"path":"/","data":{"-N1":true}}"#)])
            .chain(futures::stream::pending());
        let snapshots = apply_events(body, cancel_rx, "/Products.json".to_owned());
        let mut snapshots = std::pin::pin!(snapshots);

        assert_eq!(snapshots.next().await, Some(json!({ "-N1": true })));

        cancel_tx.send(()).unwrap();
        assert_eq!(snapshots.next().await, None);
    }

    #[test]
    fn test_url_without_query() {
        let url = database(None).url("Products/-N1", &[]).unwrap();
        assert_eq!(url.as_str(), "https://my-app.firebaseio.com/Products/-N1.json");
    }

    #[test]
    fn test_url_with_owner_filter_and_auth() {
        let query = [
            ("orderBy", "\"userId\"".to_owned()),
            ("equalTo", "\"uid-1\"".to_owned()),
        ];
        let url = database(Some("id-token")).url(PRODUCTS_PATH, &query).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("orderBy".to_owned(), "\"userId\"".to_owned()),
                ("equalTo".to_owned(), "\"uid-1\"".to_owned()),
                ("auth".to_owned(), "id-token".to_owned()),
            ]
        );
    }

    #[test]
    fn test_products_from_snapshot_orders_by_key_and_skips_bad_records() {
        let snapshot = json!({
            "-N2": record("-N2", "uid-1"),
            "-N1": record("-N1", "uid-1"),
            "-N3": { "name": "half written" }
        });

        let products = products_from_snapshot(snapshot, &ProductFilter::All);
        let ids: Vec<&str> = products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["-N1", "-N2"]);
    }

    #[test]
    fn test_products_from_snapshot_applies_owner_filter() {
        let snapshot = json!({
            "-N1": record("-N1", "uid-1"),
            "-N2": record("-N2", "uid-2")
        });

        let products =
            products_from_snapshot(snapshot, &ProductFilter::Owner(UserId::new("uid-2")));
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id.as_str(), "-N2");
    }

    #[test]
    fn test_products_from_null_snapshot_is_empty() {
        assert!(products_from_snapshot(Value::Null, &ProductFilter::All).is_empty());
    }

    #[test]
    fn test_bookmarks_from_snapshot_uses_keys() {
        let ids = bookmarks_from_snapshot(json!({ "-N1": true, "-N7": { "savedAt": 1 } }));
        assert_eq!(
            ids,
            BTreeSet::from([ProductId::new("-N1"), ProductId::new("-N7")])
        );
    }
}
