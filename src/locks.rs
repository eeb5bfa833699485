// src/locks.rs
use crate::models::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

fn lock_slots(slots: &Slots) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

/// One async mutex per user. Holders for different users never wait on
/// each other. A user's slot lives only while someone holds or waits on it.
#[derive(Default)]
pub struct UserLocks {
    slots: Slots,
}

/// Exclusive access to one user until dropped.
pub struct UserGuard {
    // Field order matters: the mutex is released before the slot is checked in.
    _guard: OwnedMutexGuard<()>,
    _slot: SlotRef,
}

/// A counted reference to a user's slot. The last one out removes the slot.
struct SlotRef {
    slots: Slots,
    user_id: UserId,
    mutex: Option<Arc<AsyncMutex<()>>>,
}

impl Drop for SlotRef {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        drop(self.mutex.take());
        let idle = slots
            .get(&self.user_id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if idle {
            slots.remove(&self.user_id);
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &UserId) -> UserGuard {
        let mutex = lock_slots(&self.slots)
            .entry(user_id.clone())
            .or_default()
            .clone();
        let slot = SlotRef {
            slots: self.slots.clone(),
            user_id: user_id.clone(),
            mutex: Some(mutex.clone()),
        };
        UserGuard {
            _guard: mutex.lock_owned().await,
            _slot: slot,
        }
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn id(n: u8) -> UserId {
        UserId::parse(&format!("{:024x}", n)).unwrap()
    }

    #[tokio::test]
    async fn same_user_waits() {
        let locks = UserLocks::new();
        let _held = locks.acquire(&id(1)).await;
        assert!(timeout(Duration::from_millis(50), locks.acquire(&id(1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn different_users_do_not_wait() {
        let locks = UserLocks::new();
        let _held = locks.acquire(&id(1)).await;
        assert!(timeout(Duration::from_millis(50), locks.acquire(&id(2)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn slots_are_removed_once_released() {
        let locks = UserLocks::new();
        let first = locks.acquire(&id(1)).await;
        let second = locks.acquire(&id(2)).await;
        assert_eq!(locks.slot_count(), 2);
        drop(first);
        assert_eq!(locks.slot_count(), 1);
        drop(second);
        assert_eq!(locks.slot_count(), 0);

        for n in 0..200 {
            let _guard = locks.acquire(&id(n)).await;
        }
        assert_eq!(locks.slot_count(), 0);
    }

    #[tokio::test]
    async fn slot_outlives_holder_while_others_wait() {
        let locks = Arc::new(UserLocks::new());
        let held = locks.acquire(&id(7)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id(7)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        assert_eq!(locks.slot_count(), 1);
        waiter.await.unwrap();
        assert_eq!(locks.slot_count(), 0);
    }
}
