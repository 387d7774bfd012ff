use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::chat::events::ServerEvent;

pub type ConnectionId = Uuid;
pub type Outbox = UnboundedSender<ServerEvent>;

/// A joined user: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
struct Connection {
    outbox: Outbox,
    user: Option<ChatUser>,
}

#[derive(Debug, Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    /// Room per user; the most recent connection wins
    users: HashMap<String, ConnectionId>,
    admins: HashSet<ConnectionId>,
}

/// Process-local registry of live chat sockets and the rooms they joined.
///
/// The lock is only held for map access; sends go through unbounded channels
/// so nothing here awaits.
#[derive(Debug, Default)]
pub struct ChatHub {
    registry: RwLock<Registry>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = Uuid::new_v4();
        self.registry
            .write()
            .connections
            .insert(id, Connection { outbox, user: None });
        id
    }

    pub fn join_user(&self, conn: ConnectionId, user: ChatUser) {
        let mut registry = self.registry.write();
        let Some(connection) = registry.connections.get_mut(&conn) else {
            return;
        };
        let previous = connection.user.replace(user.clone());
        // Leaving the previous room, unless a newer socket already owns it.
        if let Some(previous) = previous.filter(|p| p.id != user.id) {
            if registry.users.get(&previous.id) == Some(&conn) {
                registry.users.remove(&previous.id);
            }
        }
        registry.users.insert(user.id, conn);
    }

    pub fn join_admin(&self, conn: ConnectionId) {
        let mut registry = self.registry.write();
        if registry.connections.contains_key(&conn) {
            registry.admins.insert(conn);
        }
    }

    pub fn user_of(&self, conn: ConnectionId) -> Option<ChatUser> {
        self.registry
            .read()
            .connections
            .get(&conn)
            .and_then(|c| c.user.clone())
    }

    /// Deliver to one connection. Closed peers are dropped silently.
    pub fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(connection) = self.registry.read().connections.get(&conn) {
            let _ = connection.outbox.send(event);
        }
    }

    /// Deliver to the user's room. Returns false when the user is offline.
    pub fn send_to_user(&self, user_id: &str, event: ServerEvent) -> bool {
        let registry = self.registry.read();
        let Some(connection) = registry
            .users
            .get(user_id)
            .and_then(|conn| registry.connections.get(conn))
        else {
            return false;
        };
        connection.outbox.send(event).is_ok()
    }

    pub fn broadcast_admins(&self, event: ServerEvent) -> usize {
        let registry = self.registry.read();
        registry
            .admins
            .iter()
            .filter_map(|conn| registry.connections.get(conn))
            .filter(|connection| connection.outbox.send(event.clone()).is_ok())
            .count()
    }

    pub fn disconnect(&self, conn: ConnectionId) {
        let mut registry = self.registry.write();
        let Some(connection) = registry.connections.remove(&conn) else {
            return;
        };
        registry.admins.remove(&conn);
        if let Some(user) = connection.user {
            if registry.users.get(&user.id) == Some(&conn) {
                registry.users.remove(&user.id);
            }
        }
    }

    pub fn online_users(&self) -> usize {
        self.registry.read().users.len()
    }

    pub fn online_admins(&self) -> usize {
        self.registry.read().admins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn user(id: &str) -> ChatUser {
        ChatUser {
            id: id.to_string(),
            name: id.to_string(),
        }
    }

    fn marker(user_id: &str) -> ServerEvent {
        ServerEvent::MessagesMarkedRead {
            user_id: user_id.to_string(),
            updated: true,
        }
    }

    #[test]
    fn test_latest_connection_wins() {
        let hub = ChatHub::new();
        let (old_tx, mut old_rx) = unbounded_channel();
        let (new_tx, mut new_rx) = unbounded_channel();
        let old = hub.connect(old_tx);
        let new = hub.connect(new_tx);

        hub.join_user(old, user("u_1"));
        hub.join_user(new, user("u_1"));

        assert!(hub.send_to_user("u_1", marker("u_1")));
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());

        // The stale socket leaving must not evict the live one.
        hub.disconnect(old);
        assert_eq!(hub.online_users(), 1);
        hub.disconnect(new);
        assert_eq!(hub.online_users(), 0);
        assert!(!hub.send_to_user("u_1", marker("u_1")));
    }

    #[test]
    fn test_rejoin_as_another_user_leaves_old_room() {
        let hub = ChatHub::new();
        let (tx, mut rx) = unbounded_channel();
        let conn = hub.connect(tx);

        hub.join_user(conn, user("alice"));
        hub.join_user(conn, user("bob"));

        assert!(!hub.send_to_user("alice", marker("alice")));
        assert!(rx.try_recv().is_err());
        assert!(hub.send_to_user("bob", marker("bob")));
        assert_eq!(hub.online_users(), 1);

        hub.disconnect(conn);
        assert_eq!(hub.online_users(), 0);
    }

    #[test]
    fn test_rejoin_keeps_room_owned_by_newer_socket() {
        let hub = ChatHub::new();
        let (first_tx, _first_rx) = unbounded_channel();
        let (second_tx, mut second_rx) = unbounded_channel();
        let first = hub.connect(first_tx);
        let second = hub.connect(second_tx);

        hub.join_user(first, user("alice"));
        hub.join_user(second, user("alice"));
        hub.join_user(first, user("bob"));

        assert!(hub.send_to_user("alice", marker("alice")));
        assert!(second_rx.try_recv().is_ok());
        assert_eq!(hub.online_users(), 2);
    }

    #[test]
    fn test_admin_broadcast_and_cleanup() {
        let hub = ChatHub::new();
        let (a_tx, mut a_rx) = unbounded_channel();
        let (b_tx, mut b_rx) = unbounded_channel();
        let a = hub.connect(a_tx);
        let b = hub.connect(b_tx);
        hub.join_admin(a);
        hub.join_admin(b);

        assert_eq!(hub.broadcast_admins(marker("u_1")), 2);
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());

        hub.disconnect(a);
        assert_eq!(hub.online_admins(), 1);
        assert_eq!(hub.broadcast_admins(marker("u_1")), 1);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let hub = ChatHub::new();
        let (tx, rx) = unbounded_channel();
        let conn = hub.connect(tx);
        hub.join_admin(conn);
        drop(rx);
        assert_eq!(hub.broadcast_admins(marker("u_1")), 0);
    }
}
