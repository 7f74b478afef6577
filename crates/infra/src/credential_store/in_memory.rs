use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use sghm_auth::{
    Authority, CredentialRow, CredentialStore, CredentialStoreError, Role, User, UserDirectory,
    UserRecord,
};
use sghm_core::{RoleId, UserId};

#[derive(Debug, Clone)]
struct UserRow {
    name: String,
    email: String,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRow>,
    roles: BTreeMap<RoleId, Role>,
    /// Join rows in grant order.
    user_roles: Vec<(UserId, RoleId)>,
    email_index: HashMap<String, UserId>,
    next_user_id: i64,
    next_role_id: i64,
}

/// In-memory credential store for tests/dev.
///
/// Ids are assigned sequentially from 1, like identity columns. Email lookups
/// are exact: no trimming or case folding.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed store with the given authorities, in order.
    pub fn with_roles<'a>(authorities: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        for authority in authorities {
            // a freshly built lock cannot be poisoned
            let _ = store.create_role(authority);
        }
        store
    }

    /// Create a role (administrative path). Returns the existing role when
    /// the authority is already present.
    pub fn create_role(&self, authority: &str) -> Result<Role, CredentialStoreError> {
        let mut tables = self.inner.write().map_err(|_| poisoned())?;

        if let Some(existing) = tables.roles.values().find(|r| r.authority() == authority) {
            return Ok(existing.clone());
        }

        tables.next_role_id += 1;
        let role = Role::new(RoleId::new(tables.next_role_id), authority.to_string());
        tables.roles.insert(role.id(), role.clone());
        Ok(role)
    }

    /// Number of stored users.
    pub fn user_count(&self) -> Result<usize, CredentialStoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(tables.users.len())
    }
}

impl Tables {
    /// Roles granted to `user_id`, in grant order.
    ///
    /// A join row pointing at a missing role is a `Decode` error.
    fn granted_roles(&self, user_id: UserId, email: &str) -> Result<Vec<&Role>, CredentialStoreError> {
        self.user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, role_id)| {
                self.roles.get(role_id).ok_or_else(|| {
                    CredentialStoreError::Decode(format!("dangling role {role_id} for user {email}"))
                })
            })
            .collect()
    }
}

fn poisoned() -> CredentialStoreError {
    CredentialStoreError::Unavailable("in-memory store lock poisoned".to_string())
}

impl CredentialStore for InMemoryCredentialStore {
    fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;

        let Some(&user_id) = tables.email_index.get(email) else {
            return Ok(vec![]);
        };
        let Some(user) = tables.users.get(&user_id) else {
            return Ok(vec![]);
        };

        let rows = tables
            .granted_roles(user_id, &user.email)?
            .into_iter()
            .map(|role| CredentialRow::new(user.password_hash.clone(), role.id(), role.authority()))
            .collect();
        Ok(rows)
    }
}

impl UserDirectory for InMemoryCredentialStore {
    fn find_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(tables.roles.values().find(|r| r.authority() == authority).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;

        let Some(&user_id) = tables.email_index.get(email) else {
            return Ok(None);
        };
        let Some(row) = tables.users.get(&user_id) else {
            return Ok(None);
        };

        let mut user = User::new(user_id, row.name.clone(), row.email.clone(), row.password_hash.clone());
        for role in tables.granted_roles(user_id, &row.email)? {
            user.add_role(role.clone());
        }
        Ok(Some(user))
    }

    fn insert_user(&self, record: UserRecord) -> Result<UserId, CredentialStoreError> {
        let mut tables = self.inner.write().map_err(|_| poisoned())?;

        if tables.email_index.contains_key(&record.email) {
            return Err(CredentialStoreError::Duplicate(format!("email {}", record.email)));
        }
        if let Some(missing) = record.role_ids.iter().find(|id| !tables.roles.contains_key(*id)) {
            return Err(CredentialStoreError::Query(format!("unknown role id {missing}")));
        }

        tables.next_user_id += 1;
        let user_id = UserId::new(tables.next_user_id);

        tables.email_index.insert(record.email.clone(), user_id);
        tables.users.insert(
            user_id,
            UserRow {
                name: record.name,
                email: record.email,
                password_hash: record.password_hash,
            },
        );
        for role_id in record.role_ids {
            if !tables.user_roles.contains(&(user_id, role_id)) {
                tables.user_roles.push((user_id, role_id));
            }
        }

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sghm_core::Entity;

    use super::*;

    fn record(email: &str, role_ids: Vec<RoleId>) -> UserRecord {
        UserRecord {
            name: "Ana".to_string(),
            email: email.to_string(),
            password_hash: "h1".to_string(),
            role_ids,
        }
    }

    #[test]
    fn join_yields_one_row_per_granted_role() {
        let store = InMemoryCredentialStore::with_roles(["ROLE_ADMIN", "ROLE_STAFF"]);
        let admin = store.find_role_by_authority("ROLE_ADMIN").unwrap().unwrap();
        let staff = store.find_role_by_authority("ROLE_STAFF").unwrap().unwrap();

        store
            .insert_user(record("a@x.com", vec![admin.id(), staff.id()]))
            .unwrap();

        let rows = store.search_user_and_roles_by_email("a@x.com").unwrap();
        assert_eq!(
            rows,
            vec![
                CredentialRow::new("h1", RoleId::new(1), "ROLE_ADMIN"),
                CredentialRow::new("h1", RoleId::new(2), "ROLE_STAFF"),
            ]
        );
    }

    #[test]
    fn unknown_email_yields_no_rows() {
        let store = InMemoryCredentialStore::new();
        assert!(store.search_user_and_roles_by_email("missing@x.com").unwrap().is_empty());
    }

    #[test]
    fn user_without_roles_yields_no_rows() {
        let store = InMemoryCredentialStore::new();
        store.insert_user(record("a@x.com", vec![])).unwrap();
        assert!(store.search_user_and_roles_by_email("a@x.com").unwrap().is_empty());
    }

    #[test]
    fn lookup_is_exact() {
        let store = InMemoryCredentialStore::with_roles(["ROLE_ADMIN"]);
        store.insert_user(record("a@x.com", vec![RoleId::new(1)])).unwrap();

        assert!(store.search_user_and_roles_by_email("A@x.com").unwrap().is_empty());
        assert!(store.search_user_and_roles_by_email(" a@x.com").unwrap().is_empty());
    }

    #[test]
    fn email_is_unique() {
        let store = InMemoryCredentialStore::new();
        assert_eq!(store.insert_user(record("a@x.com", vec![])).unwrap(), UserId::new(1));

        let err = store.insert_user(record("a@x.com", vec![])).unwrap_err();
        assert!(matches!(err, CredentialStoreError::Duplicate(_)));
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[test]
    fn unknown_role_ids_are_rejected_without_writing() {
        let store = InMemoryCredentialStore::new();
        let err = store.insert_user(record("a@x.com", vec![RoleId::new(9)])).unwrap_err();
        assert!(matches!(err, CredentialStoreError::Query(_)));
        assert_eq!(store.user_count().unwrap(), 0);
    }

    #[test]
    fn full_record_carries_id_and_name() {
        let store = InMemoryCredentialStore::with_roles(["ROLE_ADMIN"]);
        store.insert_user(record("a@x.com", vec![RoleId::new(1)])).unwrap();

        let user = store.find_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(user.id(), Some(UserId::new(1)));
        assert_eq!(user.name(), Some("Ana"));
        assert!(user.has_role("ROLE_ADMIN"));

        assert!(store.find_user_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn create_role_is_idempotent_per_authority() {
        let store = InMemoryCredentialStore::new();
        let first = store.create_role("ROLE_ADMIN").unwrap();
        let again = store.create_role("ROLE_ADMIN").unwrap();
        assert_eq!(first.id(), again.id());
        assert_eq!(store.create_role("ROLE_OPERATOR").unwrap().id(), RoleId::new(2));
    }

    #[test]
    fn dangling_grant_is_a_decode_error_for_both_lookups() {
        let store = InMemoryCredentialStore::with_roles(["ROLE_ADMIN"]);
        store.insert_user(record("a@x.com", vec![RoleId::new(1)])).unwrap();
        store
            .inner
            .write()
            .unwrap()
            .user_roles
            .push((UserId::new(1), RoleId::new(99)));

        let err = store.search_user_and_roles_by_email("a@x.com").unwrap_err();
        assert!(matches!(err, CredentialStoreError::Decode(_)));

        let err = store.find_user_by_email("a@x.com").unwrap_err();
        assert!(matches!(err, CredentialStoreError::Decode(_)));
    }

    #[test]
    fn poisoned_lock_is_unavailable() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let writer = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = writer.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(store.user_count(), Err(CredentialStoreError::Unavailable(_))));
        assert!(matches!(
            store.search_user_and_roles_by_email("a@x.com"),
            Err(CredentialStoreError::Unavailable(_))
        ));
    }
}
