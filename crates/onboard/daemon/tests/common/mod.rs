//! Recording collaborator doubles and an in-memory orchestrator harness
#![allow(dead_code)]

use async_trait::async_trait;
use onboard_daemon::collaborators::{
    AccessToken, ChannelProvisioner, CollaboratorError, CollaboratorResult, Collaborators,
    ContractDispatcher, InviteMailer, InviteOutcome, MembershipResolver, NotificationSink,
};
use onboard_daemon::config::{NotificationConfig, SchedulerConfig};
use onboard_daemon::{InMemoryLeaseManager, InMemoryStorage, Orchestrator, SupplierStorage};
use onboard_types::{ChannelRef, ContractTemplate, DocumentRef, SupplierId, SupplierRecord, UserRef};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const BROADCAST: &str = "C-OPS";

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeChannels {
    pub calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    held: AtomicBool,
    /// Signalled when a held call is parked
    pub entered: Notify,
    /// Releases a parked call
    pub release: Notify,
}

impl FakeChannels {
    pub fn fail_for(&self, company: &str) {
        self.failing.lock().unwrap().insert(company.to_string());
    }

    pub fn recover(&self, company: &str) {
        self.failing.lock().unwrap().remove(company);
    }

    /// Park the next calls until `release` is notified
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelProvisioner for FakeChannels {
    async fn create_channel(&self, company_name: &str) -> CollaboratorResult<ChannelRef> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.held.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.failing.lock().unwrap().contains(company_name) {
            return Err(CollaboratorError::Api {
                method: "conversations.create".into(),
                code: "restricted_action".into(),
            });
        }
        Ok(ChannelRef::new(format!("C{:04}", n)))
    }
}

#[derive(Default)]
pub struct FakeMembership {
    members: Mutex<HashMap<String, UserRef>>,
    pub lookups: AtomicUsize,
    pub invites: Mutex<Vec<(ChannelRef, UserRef)>>,
    pub fail_lookup: AtomicBool,
}

impl FakeMembership {
    pub fn join(&self, email: &str, user: &str) {
        self.members
            .lock()
            .unwrap()
            .insert(email.to_string(), UserRef::new(user));
    }

    pub fn invites(&self) -> usize {
        self.invites.lock().unwrap().len()
    }
}

#[async_trait]
impl MembershipResolver for FakeMembership {
    async fn lookup(&self, email: &str) -> CollaboratorResult<Option<UserRef>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Transport("connection reset".into()));
        }
        Ok(self.members.lock().unwrap().get(email).cloned())
    }

    async fn invite(&self, channel: &ChannelRef, user: &UserRef) -> CollaboratorResult<InviteOutcome> {
        let mut invites = self.invites.lock().unwrap();
        let already = invites.iter().any(|(c, u)| c == channel && u == user);
        invites.push((channel.clone(), user.clone()));
        Ok(if already {
            InviteOutcome::AlreadyMember
        } else {
            InviteOutcome::Invited
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl FakeMailer {
    pub fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl InviteMailer for FakeMailer {
    async fn send_join_invite(&self, email: &str, _company_name: &str) -> CollaboratorResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status {
                service: "mail relay",
                status: 502,
                body: "bad gateway".into(),
            });
        }
        self.sent.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeContracts {
    pub tokens: AtomicUsize,
    pub documents: Mutex<Vec<(ContractTemplate, String)>>,
    pub fail_token: AtomicBool,
}

impl FakeContracts {
    pub fn tokens(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl ContractDispatcher for FakeContracts {
    async fn issue_token(&self) -> CollaboratorResult<AccessToken> {
        self.tokens.fetch_add(1, Ordering::SeqCst);
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status {
                service: "eformsign",
                status: 401,
                body: "unauthorized".into(),
            });
        }
        Ok(AccessToken {
            access_token: "token".into(),
            api_url: Some("https://api.example.test".into()),
            expires_in: Some(3600),
        })
    }

    async fn create_document(
        &self,
        _token: &AccessToken,
        template: &ContractTemplate,
        recipient_email: &str,
        _recipient_name: &str,
    ) -> CollaboratorResult<DocumentRef> {
        let mut documents = self.documents.lock().unwrap();
        documents.push((template.clone(), recipient_email.to_string()));
        Ok(DocumentRef::new(format!("doc-{}", documents.len())))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn to(&self, target: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, target: &str, message: &str) -> CollaboratorResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((target.to_string(), message.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub storage: InMemoryStorage,
    pub leases: Arc<InMemoryLeaseManager>,
    pub channels: Arc<FakeChannels>,
    pub membership: Arc<FakeMembership>,
    pub mailer: Arc<FakeMailer>,
    pub contracts: Arc<FakeContracts>,
    pub sink: Arc<RecordingSink>,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
}

impl Harness {
    pub async fn new(records: Vec<SupplierRecord>) -> Self {
        Self {
            storage: InMemoryStorage::with_suppliers(records).await,
            leases: Arc::new(InMemoryLeaseManager::new()),
            channels: Arc::new(FakeChannels::default()),
            membership: Arc::new(FakeMembership::default()),
            mailer: Arc::new(FakeMailer::default()),
            contracts: Arc::new(FakeContracts::default()),
            sink: Arc::new(RecordingSink::default()),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig {
                broadcast_channel: Some(BROADCAST.to_string()),
                portal_login_url: Some("https://portal.example.test/login".into()),
                portal_account: Some("shared-admin".into()),
                guide_channels: vec!["C-GUIDE".into()],
            },
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            channels: self.channels.clone(),
            membership: self.membership.clone(),
            mailer: self.mailer.clone(),
            contracts: self.contracts.clone(),
            notifications: self.sink.clone(),
        }
    }

    /// A fresh orchestrator (own lease holder id) over the shared fakes
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.storage.clone()),
            self.leases.clone(),
            self.collaborators(),
            &self.scheduler,
            self.notifications.clone(),
        )
    }

    pub async fn record(&self, id: i64) -> SupplierRecord {
        self.storage
            .get_supplier(SupplierId::new(id))
            .await
            .unwrap()
            .expect("record exists")
    }
}

pub fn supplier(id: i64, company: &str) -> SupplierRecord {
    SupplierRecord::new(
        SupplierId::new(id),
        company,
        format!("{}@supplier.test", company.to_lowercase()),
    )
    .with_template(ContractTemplate::flat_rate(Decimal::from(10)))
}

pub fn email_of(company: &str) -> String {
    format!("{}@supplier.test", company.to_lowercase())
}
