//! In-memory user store backing the demo API.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(u64),
    #[error("email `{0}` is already registered")]
    EmailTaken(String),
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

#[derive(Debug, Default)]
pub struct UserStore {
    inner: RwLock<Inner>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self, limit: usize, offset: usize) -> (usize, Vec<User>) {
        let inner = self.inner.read().await;
        let page = inner
            .users
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (inner.users.len(), page)
    }

    pub async fn get(&self, id: u64) -> Result<User, StoreError> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::EmailTaken(new_user.email));
        }
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            name: new_user.name,
            email: new_user.email,
            age: new_user.age,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn update(&self, id: u64, patch: UserPatch) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &patch.email {
            if inner.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::EmailTaken(email.clone()));
            }
        }
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if patch.age.is_some() {
            user.age = patch.age;
        }
        Ok(user.clone())
    }

    pub async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}
