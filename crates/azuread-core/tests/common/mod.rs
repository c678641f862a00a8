//! Test doubles shared by the core contract tests
//!
//! Nothing here talks to a directory. The doubles record what they were
//! asked to do so tests can assert on call order and timing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use azuread_core::error::{Error, Result};
use azuread_core::replication::{Clock, ReplicationPolicy, ReplicationWaiter};
use azuread_core::traits::{
    DirectoryGroup, DirectoryUser, GroupDirectory, RelationshipApi, ResourceHandler, UserDirectory,
};
use azuread_core::{Operation, ResourceData};

/// One call made against a [`RecordingRelationship`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Add(Vec<String>),
    Remove(Vec<String>),
}

/// In-memory relationship that logs every call
pub struct RecordingRelationship {
    members: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    fail_add: bool,
}

impl RecordingRelationship {
    pub fn new(existing: &[&str]) -> Self {
        Self {
            members: Mutex::new(existing.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
            fail_add: false,
        }
    }

    /// Every `add` returns a backend error
    pub fn failing_add(existing: &[&str]) -> Self {
        Self {
            fail_add: true,
            ..Self::new(existing)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn members(&self) -> Vec<String> {
        self.members.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationshipApi for RecordingRelationship {
    fn relationship(&self) -> &'static str {
        "members"
    }

    async fn list(&self, _object_id: &str) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(Call::List);
        Ok(self.members())
    }

    async fn add(&self, _object_id: &str, ids: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Add(ids.to_vec()));
        if self.fail_add {
            return Err(Error::api(400, "Request_BadRequest", "add refused"));
        }
        self.members.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn remove(&self, _object_id: &str, ids: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Remove(ids.to_vec()));
        self.members
            .lock()
            .unwrap()
            .retain(|m| !ids.iter().any(|id| id.eq_ignore_ascii_case(m)));
        Ok(())
    }
}

/// Clock that only moves when something sleeps on it
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.offset.lock().unwrap() += duration;
    }
}

/// What a [`ScriptedHandler`] does when called
#[derive(Debug, Clone)]
pub enum Script {
    /// Set the ID and copy `object_id` into state
    Succeed(&'static str),
    /// Clear the ID as if the object vanished
    Vanish,
    /// Set the ID, then fail
    FailAfterId(&'static str),
    Fail(fn() -> Error),
    /// Sleep longer than any test timeout
    Hang,
    /// Set the ID after a slow write, then wait for an object that never shows up
    NeverReplicates(&'static str),
}

/// Resource handler that follows a fixed script for every operation
pub struct ScriptedHandler {
    script: Script,
    operations: Mutex<Vec<&'static str>>,
}

impl ScriptedHandler {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            operations: Mutex::new(Vec::new()),
        })
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    async fn run(&self, operation: &'static str, d: &mut ResourceData) -> Result<()> {
        self.operations.lock().unwrap().push(operation);
        match &self.script {
            Script::Succeed(id) => {
                d.set_id(*id);
                d.set("object_id", *id);
                Ok(())
            }
            Script::Vanish => {
                d.clear_id();
                Ok(())
            }
            Script::FailAfterId(id) => {
                d.set_id(*id);
                d.set("object_id", *id);
                Err(Error::backend(operation, *id, "owners could not be added"))
            }
            Script::Fail(make) => Err(make()),
            Script::NeverReplicates(id) => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                d.set_id(*id);
                let policy = ReplicationPolicy::new(d.remaining(Operation::Create))
                    .with_poll_interval(Duration::from_millis(20));
                ReplicationWaiter::new(policy)
                    .wait_for_creation("group", || async {
                        Err::<(), _>(Error::not_found("group does not exist yet"))
                    })
                    .await
            }
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ResourceHandler for ScriptedHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        self.run("create", d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        self.run("read", d).await
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        self.run("update", d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        self.run("delete", d).await
    }
}

/// Directory backed by plain maps
#[derive(Default)]
pub struct InMemoryDirectory {
    pub users: Vec<DirectoryUser>,
    pub groups: Vec<DirectoryGroup>,
    pub members: HashMap<String, Vec<String>>,
    pub owners: HashMap<String, Vec<String>>,
}

impl InMemoryDirectory {
    pub fn with_user(mut self, object_id: &str, upn: &str, nickname: &str) -> Self {
        self.users.push(DirectoryUser {
            object_id: object_id.to_string(),
            user_principal_name: upn.to_string(),
            account_enabled: true,
            mail_nickname: Some(nickname.to_string()),
            mail: Some(format!("{nickname}@example.com")),
            ..Default::default()
        });
        self
    }

    pub fn with_group(mut self, object_id: &str, display_name: &str, members: &[&str]) -> Self {
        self.groups.push(DirectoryGroup {
            object_id: object_id.to_string(),
            display_name: display_name.to_string(),
            description: None,
        });
        self.members.insert(
            object_id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    fn find_user(&self, pred: impl Fn(&DirectoryUser) -> bool) -> Option<DirectoryUser> {
        self.users.iter().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn user_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryUser>> {
        Ok(self.find_user(|u| u.object_id == object_id))
    }

    async fn user_by_principal_name(&self, upn: &str) -> Result<Option<DirectoryUser>> {
        Ok(self.find_user(|u| u.user_principal_name.eq_ignore_ascii_case(upn)))
    }

    async fn user_by_mail(&self, mail: &str) -> Result<Option<DirectoryUser>> {
        Ok(self.find_user(|u| u.mail.as_deref() == Some(mail)))
    }

    async fn user_by_mail_nickname(&self, mail_nickname: &str) -> Result<Option<DirectoryUser>> {
        Ok(self.find_user(|u| u.mail_nickname.as_deref() == Some(mail_nickname)))
    }
}

#[async_trait]
impl GroupDirectory for InMemoryDirectory {
    async fn group_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryGroup>> {
        Ok(self.groups.iter().find(|g| g.object_id == object_id).cloned())
    }

    async fn groups_by_display_name(&self, display_name: &str) -> Result<Vec<DirectoryGroup>> {
        Ok(self
            .groups
            .iter()
            .filter(|g| g.display_name == display_name)
            .cloned()
            .collect())
    }

    async fn group_members(&self, object_id: &str) -> Result<Vec<String>> {
        Ok(self.members.get(object_id).cloned().unwrap_or_default())
    }

    async fn group_owners(&self, object_id: &str) -> Result<Vec<String>> {
        Ok(self.owners.get(object_id).cloned().unwrap_or_default())
    }
}

pub const GROUP_ID: &str = "00000000-0000-0000-0000-0000000000a1";
pub const USER_A: &str = "00000000-0000-0000-0000-0000000000b1";
pub const USER_B: &str = "00000000-0000-0000-0000-0000000000b2";
pub const USER_C: &str = "00000000-0000-0000-0000-0000000000b3";
