//! # Naviera Core
//!
//! The reducer architecture the Naviera service is built on.
//!
//! - **State**: domain state owned by a store
//! - **Action**: every input a reducer accepts (commands and the events effects feed back)
//! - **Reducer**: pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of I/O, executed later by the runtime
//! - **Environment**: injected dependencies (repositories, clock, hashers)
//!
//! Reducers never touch storage, the network or the wall clock directly. Anything
//! that must wait on the outside world is returned as an [`Effect`] and its result
//! comes back as another action.
//!
//! ## Example
//!
//! ```
//! use naviera_core::{smallvec, Effect, Reducer, SmallVec};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! enum CounterAction {
//!     Add(i64),
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Counter,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Add(n) => state.value += n,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = Counter::default();
//! let _ = CounterReducer.reduce(&mut state, CounterAction::Add(2), &());
//! assert_eq!(state.value, 2);
//! ```

pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub use effect::Effect;
pub use environment::{Clock, SystemClock};
pub use reducer::Reducer;

mod effect_macros;

/// Reducer module - the trait all business logic implements
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The core abstraction for business logic.
    ///
    /// A reducer validates an action, updates state in place and returns the
    /// effects the runtime should execute. Most actions produce zero or one
    /// effect, so effects are collected in a `SmallVec` that stays on the stack.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Returning one from a reducer does nothing until the
/// runtime executes it.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Describes a side effect to be executed by the store.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        ///
        /// Each child (including the action it feeds back) completes before the
        /// next child starts.
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after the delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// If the future resolves to `Some(action)`, that action is fed back into
        /// the reducer.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Futures are opaque, so Debug is written by hand.
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Lift this effect into another action type.
        ///
        /// Used when a parent reducer embeds a child reducer and wraps its
        /// actions.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            Action: Send + 'static,
            B: Send + 'static,
            F: Fn(Action) -> B + Clone + Send + Sync + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => Effect::Parallel(
                    effects.into_iter().map(|e| e.map(f.clone())).collect(),
                ),
                Effect::Sequential(effects) => Effect::Sequential(
                    effects.into_iter().map(|e| e.map(f.clone())).collect(),
                ),
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
            }
        }
    }
}

/// Environment module - dependency traits injected into reducers
pub mod environment {
    use chrono::{DateTime, NaiveDate, Utc};

    /// Abstracts time so reducers stay deterministic under test.
    pub trait Clock: Send + Sync {
        /// Current instant
        fn now(&self) -> DateTime<Utc>;

        /// Current calendar date (UTC)
        fn today(&self) -> NaiveDate {
            self.now().date_naive()
        }
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_today_matches_now() {
        let clock = SystemClock;
        let now = clock.now();
        let today = clock.today();
        // Midnight rollover between the two calls is the only way these differ.
        assert!(today == now.date_naive() || today == now.date_naive().succ_opt().unwrap_or(today));
    }

    #[test]
    fn merge_and_chain_wrap_children() {
        let parallel: Effect<u8> = Effect::merge(vec![Effect::None, Effect::None]);
        assert!(matches!(parallel, Effect::Parallel(ref v) if v.len() == 2));

        let sequential: Effect<u8> = Effect::chain(vec![Effect::Delay {
            duration: Duration::from_millis(1),
            action: Box::new(7),
        }]);
        assert!(matches!(sequential, Effect::Sequential(ref v) if v.len() == 1));
        assert!(!sequential.is_none());
    }

    #[tokio::test]
    async fn map_wraps_future_and_delay_actions() {
        #[derive(Debug, PartialEq)]
        enum Parent {
            Child(u8),
        }

        let effect: Effect<u8> = Effect::chain(vec![
            Effect::Future(Box::pin(async { Some(3) })),
            Effect::Delay {
                duration: Duration::from_millis(5),
                action: Box::new(4),
            },
        ]);

        let Effect::Sequential(children) = effect.map(Parent::Child) else {
            unreachable!("map keeps the effect shape");
        };
        let mut children = children.into_iter();
        let Some(Effect::Future(fut)) = children.next() else {
            unreachable!("first child is a future");
        };
        assert_eq!(fut.await, Some(Parent::Child(3)));
        let Some(Effect::Delay { action, .. }) = children.next() else {
            unreachable!("second child is a delay");
        };
        assert_eq!(*action, Parent::Child(4));
    }

    #[test]
    fn debug_hides_future_body() {
        let effect: Effect<u8> = Effect::Future(Box::pin(async { Some(1) }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }
}
