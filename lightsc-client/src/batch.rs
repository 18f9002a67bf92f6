//! Batch sessions and id-correlated batch results
//!
//! While a batch is open every call is queued instead of sent. Closing the
//! batch sends all queued requests as one JSON array and reads one reply
//! array back. lightsd may answer in any order, so replies are matched to
//! requests by id and [`BatchResults`] always lists them in the order the
//! requests were made.
//!
//! # Usage Pattern
//!
//! ```rust,no_run
//! use lightsc_client::LightsClient;
//!
//! # async fn example(client: &mut LightsClient) -> lightsc_core::Result<()> {
//! let mut batch = client.batch()?;
//! let on = batch.power_on("#kitchen").await?;
//! let off = batch.power_off("#bedroom").await?;
//! let results = batch.send().await?;
//!
//! assert_eq!(results.len(), 2);
//! let kitchen: bool = results.get(on.queued_id().unwrap())?;
//! # let _ = (kitchen, off);
//! # Ok(())
//! # }
//! ```
//!
//! Dropping a [`Batch`] without calling `send` discards everything it
//! queued and puts the client back in single mode.

use crate::client::LightsClient;
use crate::transport::Transport;
use lightsc_core::{codec, Error, Id, JsonRpcErrorData, JsonRpcRequest, JsonRpcResponse, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// What the server said about one request: its result or its error
pub type Outcome = std::result::Result<Value, JsonRpcErrorData>;

/// One queued request and what became of it
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Id the request was sent with
    pub id: Id,
    /// Method that was called
    pub method: String,
    /// The matched reply, or a `MISSING_REPLY` error if none came back
    pub outcome: Outcome,
}

/// Results of a flushed batch, in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    entries: Vec<BatchEntry>,
}

impl BatchResults {
    /// Match reply elements to the requests that were sent
    ///
    /// Every request gets exactly one entry. An error with a null id (the
    /// server couldn't read the batch, or an element of it) is given to every
    /// request left without a reply; otherwise those get `MISSING_REPLY`.
    /// Elements that are not valid response objects, or whose id matches no
    /// request, are logged and dropped.
    pub(crate) fn correlate(requests: &[JsonRpcRequest], replies: Vec<Value>) -> Self {
        let mut by_id: HashMap<Id, JsonRpcResponse> = HashMap::with_capacity(replies.len());
        let mut rejection: Option<JsonRpcErrorData> = None;

        for decoded in codec::decode_batch_responses(replies) {
            let response = match decoded {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid element in batch reply");
                    continue;
                }
            };

            if response.id.is_null() {
                match (response.error, &rejection) {
                    (Some(error), None) => {
                        tracing::warn!(
                            code = error.code,
                            message = %error.message,
                            "Server rejected batch requests it could not identify"
                        );
                        rejection = Some(error);
                    }
                    (Some(error), Some(_)) => {
                        tracing::warn!(
                            code = error.code,
                            message = %error.message,
                            "Ignoring further null-id error in batch reply"
                        );
                    }
                    (None, _) => tracing::warn!("Ignoring batch reply with null id and no error"),
                }
                continue;
            }
            if !requests.iter().any(|r| r.id == response.id) {
                tracing::warn!(id = %response.id, "Ignoring batch reply with unknown id");
                continue;
            }
            if by_id.contains_key(&response.id) {
                tracing::warn!(id = %response.id, "Ignoring duplicate batch reply");
                continue;
            }
            by_id.insert(response.id.clone(), response);
        }

        let entries = requests
            .iter()
            .map(|request| {
                let outcome = by_id
                    .remove(&request.id)
                    .and_then(JsonRpcResponse::into_outcome)
                    .unwrap_or_else(|| match &rejection {
                        Some(error) => Err(error.clone()),
                        None => Err(JsonRpcErrorData::missing_reply(&request.id)),
                    });
                BatchEntry {
                    id: request.id.clone(),
                    method: request.method.clone(),
                    outcome,
                }
            })
            .collect();

        Self { entries }
    }

    /// Typed result for the request with `id`
    ///
    /// # Errors
    ///
    /// - `Error::Rpc` if the server answered with an error (or never answered)
    /// - `Error::Serialization` if the result doesn't decode as `R`
    /// - `Error::State` if no request in this batch has that id
    pub fn get<R: DeserializeOwned>(&self, id: &Id) -> Result<R> {
        let entry = self
            .entry(id)
            .ok_or_else(|| Error::State(format!("no request with id {} in this batch", id)))?;

        match &entry.outcome {
            Ok(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::Serialization(e.to_string())),
            Err(error) => Err(Error::Rpc(error.clone())),
        }
    }

    /// Entry for the request with `id`
    pub fn entry(&self, id: &Id) -> Option<&BatchEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Raw outcome for the request with `id`
    pub fn outcome(&self, id: &Id) -> Option<&Outcome> {
        self.entry(id).map(|entry| &entry.outcome)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if every request succeeded
    pub fn all_success(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_ok())
    }

    /// Every failed request with its error
    pub fn errors(&self) -> Vec<(&Id, &JsonRpcErrorData)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().err().map(|e| (&entry.id, e)))
            .collect()
    }

    /// Outcomes alone, in request order
    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.entries.into_iter().map(|entry| entry.outcome).collect()
    }
}

impl IntoIterator for BatchResults {
    type Item = BatchEntry;
    type IntoIter = std::vec::IntoIter<BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchResults {
    type Item = &'a BatchEntry;
    type IntoIter = std::slice::Iter<'a, BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// An open batch on a [`LightsClient`]
///
/// Derefs to the client, so every command issued through it is queued.
/// Created by [`LightsClient::batch`].
pub struct Batch<'a, T: Transport> {
    client: &'a mut LightsClient<T>,
}

impl<'a, T: Transport> Batch<'a, T> {
    pub(crate) fn new(client: &'a mut LightsClient<T>) -> Self {
        Self { client }
    }

    /// Send everything queued so far as one request array
    ///
    /// Same as [`LightsClient::end_batch`]; the client is back in single mode
    /// afterwards whether or not the exchange succeeded.
    pub async fn send(self) -> Result<BatchResults> {
        self.client.end_batch().await
    }

    /// Drop everything queued so far without sending it
    pub fn discard(self) {}
}

impl<T: Transport> Deref for Batch<'_, T> {
    type Target = LightsClient<T>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<T: Transport> DerefMut for Batch<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl<T: Transport> Drop for Batch<'_, T> {
    fn drop(&mut self) {
        if self.client.is_batching() {
            let discarded = self.client.discard_batch();
            if discarded > 0 {
                tracing::debug!(discarded, "Batch dropped without sending");
            }
        }
    }
}
