use std::sync::Arc;

use jujulink_api::params::OfferRequest;
use jujulink_api::protocol::OfferDetails;
use serde::Serialize;

use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferResult {
    pub err: Option<String>,
    pub application_name: String,
    pub endpoints: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OfferListResult {
    pub err: Option<String>,
    pub offers: Vec<OfferDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleOfferResult {
    pub err: Option<String>,
    pub offer: Option<OfferDetails>,
}

impl Session {
    /// Offer application endpoints for cross-model consumption.
    ///
    /// An empty `user` or `model_name` is filled from the session (stored
    /// credentials and the bootstrapped model name) before the URL is
    /// derived.
    pub fn offer(&self, mut request: OfferRequest) -> Reply<OfferResult> {
        if request.user.is_empty() {
            request.user = self
                .credentials()
                .and_then(|c| c.user().map(str::to_owned))
                .unwrap_or_default();
        }
        if request.model_name.is_empty() {
            request.model_name = self.model_info().map(|m| m.name).unwrap_or_default();
        }

        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.offer(&request);
        let url = request.resolved_url();
        self.call(built, move |resp| OfferResult {
            err: resp
                .error
                .or_else(|| protocol.offer_error(&resp.response)),
            application_name: request.application_name,
            endpoints: request.endpoints,
            url,
        })
    }

    pub fn list_offers(&self) -> Reply<OfferListResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.list_offers();
        self.call(built, move |resp| match resp.error {
            Some(err) => OfferListResult {
                err: Some(err),
                offers: Vec::new(),
            },
            None => OfferListResult {
                err: None,
                offers: protocol.parse_offer_list(&resp.response),
            },
        })
    }

    pub fn get_offer(&self, url: &str) -> Reply<SingleOfferResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.get_offer(url);
        self.call(built, move |resp| {
            let parsed = match resp.error {
                Some(err) => Err(err),
                None => protocol.parse_offer(&resp.response),
            };
            match parsed {
                Ok(offer) => SingleOfferResult {
                    err: None,
                    offer: Some(offer),
                },
                Err(err) => SingleOfferResult {
                    err: Some(err),
                    offer: None,
                },
            }
        })
    }
}
