//! MailService facade
//!
//! Ties the credential manager, thread synchronizer and composer together.
//! Every mailbox operation first makes sure the caller's credential is valid
//! and then talks to the provider with its access token.

use log::debug;
use std::sync::Arc;

use crate::compose;
use crate::config::{GmailCredentials, MailConfig};
use crate::credential::{CredentialManager, CredentialStore};
use crate::error::Result;
use crate::gmail::{GmailAuth, GmailClient, MailApi, TokenEndpoint};
use crate::models::{ConversationDetail, Credential, OutboundMessageRequest, SentMessage, ThreadId};
use crate::sync::{Category, SummaryBatch, ThreadSynchronizer};

/// Main entry point for mail operations
pub struct MailService {
    api: Arc<dyn MailApi>,
    credentials: CredentialManager,
    synchronizer: ThreadSynchronizer,
}

impl MailService {
    pub fn new(
        api: Arc<dyn MailApi>,
        tokens: Arc<dyn TokenEndpoint>,
        store: Arc<dyn CredentialStore>,
        config: &MailConfig,
    ) -> anyhow::Result<Self> {
        let credentials =
            CredentialManager::new(tokens, store).with_expiry_margin(config.expiry_margin());
        let synchronizer = ThreadSynchronizer::new(api.clone(), config.fan_out())?;
        Ok(Self {
            api,
            credentials,
            synchronizer,
        })
    }

    /// Service backed by the Gmail REST API
    pub fn gmail(
        app: GmailCredentials,
        store: Arc<dyn CredentialStore>,
        config: &MailConfig,
    ) -> anyhow::Result<Self> {
        let api = Arc::new(GmailClient::new(config));
        let tokens = Arc::new(GmailAuth::new(app, config));
        Self::new(api, tokens, store, config)
    }

    /// See [`CredentialManager::ensure_valid`]
    pub fn ensure_valid_credential(&self, credential: &Credential) -> Result<Credential> {
        self.credentials.ensure_valid(credential)
    }

    /// List up to `max_results` conversation summaries in `category`
    pub fn list_summaries(
        &self,
        credential: &Credential,
        max_results: usize,
        category: Category,
    ) -> Result<SummaryBatch> {
        let credential = self.credentials.ensure_valid(credential)?;
        debug!("Listing {} for {}", category, credential.user_id);
        self.synchronizer
            .list_summaries(&credential.access_token, max_results, category)
    }

    /// Fetch one conversation in full; `None` if it has no messages
    pub fn get_detail(
        &self,
        credential: &Credential,
        id: &ThreadId,
    ) -> Result<Option<ConversationDetail>> {
        let credential = self.credentials.ensure_valid(credential)?;
        self.synchronizer.get_detail(&credential.access_token, id)
    }

    /// Compose and send a new message or reply
    pub fn send(
        &self,
        credential: &Credential,
        request: &OutboundMessageRequest,
    ) -> Result<SentMessage> {
        let credential = self.credentials.ensure_valid(credential)?;
        compose::send(self.api.as_ref(), &credential.access_token, request)
    }
}
