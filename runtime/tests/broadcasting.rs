//! Integration tests for Store action broadcasting
//!
//! HTTP handlers rely on `send_and_wait_for` picking out *their* terminal
//! action while other requests run through the same store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use naviera_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, SmallVec};
use naviera_runtime::{Store, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum HoldAction {
    /// Ask for a cabin number (command)
    Request { request: u32, cabin: u32 },
    /// Result of the lookup effect
    Checked { request: u32, cabin: u32 },
    /// Terminal: cabin held
    Held { request: u32, cabin: u32 },
    /// Terminal: cabin already held
    Refused { request: u32, cabin: u32 },
}

impl HoldAction {
    fn request(&self) -> u32 {
        match self {
            Self::Request { request, .. }
            | Self::Checked { request, .. }
            | Self::Held { request, .. }
            | Self::Refused { request, .. } => *request,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Held { .. } | Self::Refused { .. })
    }
}

#[derive(Debug, Default)]
struct HoldState {
    held: BTreeSet<u32>,
}

struct HoldReducer;

impl Reducer for HoldReducer {
    type State = HoldState;
    type Action = HoldAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut HoldState,
        action: HoldAction,
        _env: &(),
    ) -> SmallVec<[Effect<HoldAction>; 4]> {
        match action {
            HoldAction::Request { request, cabin } => smallvec![async_effect! {
                tokio::time::sleep(Duration::from_millis(u64::from(request % 5))).await;
                Some(HoldAction::Checked { request, cabin })
            }],
            // The check-and-insert happens under the store's write lock, so two
            // requests for the same cabin can never both be held.
            HoldAction::Checked { request, cabin } => {
                let outcome = if state.held.insert(cabin) {
                    HoldAction::Held { request, cabin }
                } else {
                    HoldAction::Refused { request, cabin }
                };
                smallvec![async_effect! { Some(outcome) }]
            },
            HoldAction::Held { .. } | HoldAction::Refused { .. } => smallvec![Effect::None],
        }
    }
}

fn store() -> Arc<Store<HoldState, HoldAction, (), HoldReducer>> {
    Arc::new(Store::new(HoldState::default(), HoldReducer, ()))
}

#[tokio::test]
async fn test_concurrent_requests_receive_their_own_result() {
    let store = store();

    let tasks: Vec<_> = (0..20u32)
        .map(|request| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .send_and_wait_for(
                        HoldAction::Request { request, cabin: request / 2 },
                        move |a| a.is_terminal() && a.request() == request,
                        Duration::from_secs(2),
                    )
                    .await
            })
        })
        .collect();

    let mut held = 0;
    let mut refused = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        match outcome {
            HoldAction::Held { .. } => held += 1,
            HoldAction::Refused { .. } => refused += 1,
            other => panic!("non-terminal outcome: {other:?}"),
        }
    }

    // Ten distinct cabins, two requests each.
    assert_eq!(held, 10);
    assert_eq!(refused, 10);
    assert_eq!(store.state(|s| s.held.len()).await, 10);
}

#[tokio::test]
async fn test_initial_action_is_not_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    let mut handle = store
        .send(HoldAction::Request { request: 1, cabin: 7 })
        .await
        .unwrap();
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first, HoldAction::Checked { request: 1, cabin: 7 });
}

#[tokio::test]
async fn test_wait_for_unmatched_predicate_times_out() {
    let store = store();
    let result = store
        .send_and_wait_for(
            HoldAction::Request { request: 3, cabin: 1 },
            |a| a.request() == 999,
            Duration::from_millis(100),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}
