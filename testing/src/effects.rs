//! In-process effect execution for tests.
//!
//! The store runs effects on spawned tasks and feeds results back
//! asynchronously. Tests that only care about *what* a reducer asks for can run
//! the effects inline instead.

use futures::future::BoxFuture;
use naviera_core::{effect::Effect, reducer::Reducer};

/// Execute effects and collect the actions they produce, without feeding them back
///
/// `Delay` effects resolve immediately. `Parallel` children are awaited in order.
pub fn drain<A>(effects: impl IntoIterator<Item = Effect<A>>) -> BoxFuture<'static, Vec<A>>
where
    A: Send + 'static,
{
    let effects: Vec<Effect<A>> = effects.into_iter().collect();
    Box::pin(async move {
        let mut produced = Vec::new();
        for effect in effects {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => produced.extend(fut.await),
                Effect::Delay { action, .. } => produced.push(*action),
                Effect::Parallel(children) | Effect::Sequential(children) => {
                    produced.extend(drain(children).await);
                },
            }
        }
        produced
    })
}

/// Reduce `action` and keep feeding produced actions back until nothing is left
///
/// Returns every action produced along the way, in the order they were reduced.
pub async fn settle<R>(
    reducer: &R,
    state: &mut R::State,
    action: R::Action,
    env: &R::Environment,
) -> Vec<R::Action>
where
    R: Reducer,
    R::Action: Clone + Send + 'static,
{
    let mut produced = Vec::new();
    let mut queue = std::collections::VecDeque::from([action]);

    while let Some(next) = queue.pop_front() {
        let effects = reducer.reduce(state, next, env);
        for action in drain(effects).await {
            produced.push(action.clone());
            queue.push_back(action);
        }
    }

    produced
}

#[cfg(test)]
mod tests {
    use super::*;
    use naviera_core::{async_effect, delay, smallvec, SmallVec};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Start,
        Loaded(u8),
        Done,
    }

    struct Chain;

    impl Reducer for Chain {
        type State = Vec<u8>;
        type Action = Action;
        type Environment = ();

        fn reduce(&self, state: &mut Vec<u8>, action: Action, _env: &()) -> SmallVec<[Effect<Action>; 4]> {
            match action {
                Action::Start => smallvec![Effect::chain(vec![
                    async_effect! { Some(Action::Loaded(1)) },
                    async_effect! { Some(Action::Loaded(2)) },
                ])],
                Action::Loaded(n) => {
                    state.push(n);
                    if n == 2 {
                        smallvec![delay! { duration: Duration::from_secs(60), action: Action::Done }]
                    } else {
                        smallvec![Effect::None]
                    }
                },
                Action::Done => smallvec![Effect::None],
            }
        }
    }

    #[tokio::test]
    async fn drain_collects_nested_actions() {
        let actions = drain(vec![
            Effect::merge(vec![async_effect! { Some(Action::Loaded(7)) }, Effect::None]),
            async_effect! { None },
        ])
        .await;
        assert_eq!(actions, vec![Action::Loaded(7)]);
    }

    #[tokio::test]
    async fn settle_runs_feedback_loop_to_quiescence() {
        let mut state = Vec::new();
        let actions = settle(&Chain, &mut state, Action::Start, &()).await;

        assert_eq!(state, vec![1, 2]);
        assert_eq!(actions, vec![Action::Loaded(1), Action::Loaded(2), Action::Done]);
    }
}
