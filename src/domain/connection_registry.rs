//! Bidirectional mapping between live connections and user identities.
//!
//! [`ConnectionRegistry`] keeps a forward index (`connection → user`) and a
//! reverse index (`user → connections`) that are always updated together,
//! so resolving a user's delivery target never scans every connection.
//!
//! The registry itself performs no locking; it is owned by
//! [`super::ChatHub`], which serializes all access behind one lock.

use std::collections::HashMap;

use super::{ConnectionId, UserId};

/// Paired-index store of which user each joined connection belongs to.
///
/// # Invariants
///
/// - `c` appears in `by_user[u]` if and only if `by_connection[c] == u`.
/// - `by_user` never holds an empty list.
/// - Each list is ordered by registration time, most recent last.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_connection: HashMap<ConnectionId, UserId>,
    by_user: HashMap<UserId, Vec<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `connection_id` to `user_id`, replacing any earlier mapping for
    /// that connection.
    ///
    /// Returns the user that was displaced, if the connection was previously
    /// joined as a *different* user. Registering the same pair twice is a
    /// no-op apart from refreshing the connection's recency.
    pub fn register(&mut self, connection_id: ConnectionId, user_id: UserId) -> Option<UserId> {
        let previous = self.by_connection.insert(connection_id, user_id);
        if let Some(prev) = previous {
            self.detach(prev, connection_id);
        }
        self.by_user.entry(user_id).or_default().push(connection_id);
        previous.filter(|prev| *prev != user_id)
    }

    /// Removes the mapping for `connection_id`, returning the user it
    /// belonged to. Returns `None` if the connection never joined or was
    /// already removed.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<UserId> {
        let user_id = self.by_connection.remove(&connection_id)?;
        self.detach(user_id, connection_id);
        Some(user_id)
    }

    /// Returns the connection messages for `user_id` should be delivered to:
    /// the most recently registered live connection of that user.
    #[must_use]
    pub fn find_connection_for_user(&self, user_id: UserId) -> Option<ConnectionId> {
        self.find_connection_for_user_except(user_id, None)
    }

    /// Like [`Self::find_connection_for_user`], but skips `exclude` and
    /// falls back to the user's next most recent connection.
    #[must_use]
    pub fn find_connection_for_user_except(
        &self,
        user_id: UserId,
        exclude: Option<ConnectionId>,
    ) -> Option<ConnectionId> {
        self.by_user
            .get(&user_id)?
            .iter()
            .rev()
            .find(|c| Some(**c) != exclude)
            .copied()
    }

    /// Returns the user a connection joined as, if any.
    #[must_use]
    pub fn user_for(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.by_connection.get(&connection_id).copied()
    }

    /// Returns `true` if the user has at least one live connection.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.by_user.contains_key(&user_id)
    }

    /// Returns every online user, sorted for stable output.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.by_user.keys().copied().collect();
        users.sort_unstable();
        users
    }

    /// Number of joined connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    /// Returns `true` if no connection has joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    fn detach(&mut self, user_id: UserId, connection_id: ConnectionId) {
        if let Some(connections) = self.by_user.get_mut(&user_id) {
            connections.retain(|c| *c != connection_id);
            if connections.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
    }
}
