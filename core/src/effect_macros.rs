//! Declarative macros for building effects without the boxing noise.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```
/// use naviera_core::{async_effect, Effect};
///
/// let effect: Effect<u32> = async_effect! {
///     Some(42)
/// };
/// assert!(matches!(effect, Effect::Future(_)));
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling a delayed action
///
/// # Example
///
/// ```
/// use naviera_core::{delay, Effect};
/// use std::time::Duration;
///
/// let effect: Effect<&str> = delay! {
///     duration: Duration::from_secs(30),
///     action: "expired"
/// };
/// assert!(matches!(effect, Effect::Delay { .. }));
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

#[cfg(test)]
#[allow(clippy::panic)] // Test assertion
mod tests {
    use crate::effect::Effect;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Loaded { value: i32 },
        TimedOut,
    }

    #[tokio::test]
    async fn async_effect_resolves_to_action() {
        let effect = async_effect! {
            Some(TestAction::Loaded { value: 42 })
        };

        let Effect::Future(fut) = effect else {
            panic!("expected Effect::Future");
        };
        assert_eq!(fut.await, Some(TestAction::Loaded { value: 42 }));
    }

    #[test]
    fn delay_boxes_action() {
        let effect = delay! {
            duration: Duration::from_secs(30),
            action: TestAction::TimedOut
        };

        match effect {
            Effect::Delay { duration, action } => {
                assert_eq!(duration, Duration::from_secs(30));
                assert_eq!(*action, TestAction::TimedOut);
            },
            other => panic!("unexpected effect: {other:?}"),
        }
    }
}
