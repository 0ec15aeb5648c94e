mod common;

use common::{receipt_handle, ScriptedBackend};
use proptest::prelude::*;
use sqsgate::consume::{
    self, ConsumeMode, PostAction, LONG_POLL_WAIT_SECONDS, VISIBILITY_HOLD_SECONDS,
};
use sqsgate::memory::InMemoryQueues;
use sqsgate::{QueueAdmin, QueueError, WaitMode};
use std::collections::HashSet;

const QUEUE: &str = "http://sqs.memory.localhost/000000000000/consume";

const ALL_MODES: [ConsumeMode; 4] = [
    ConsumeMode::FetchOnly,
    ConsumeMode::FetchAndDelete,
    ConsumeMode::FetchWithVisibilityHold,
    ConsumeMode::FetchWithLongPollAndDelete,
];

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

fn arb_bodies() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("\\PC{0,200}", 0..10usize)
}

// Every policy returns an empty result, with no post actions, on an empty queue.
#[test]
fn empty_queue_is_not_an_error() {
    block_on(async {
        for mode in ALL_MODES {
            let backend = ScriptedBackend::empty();

            let consumed = consume::consume(&backend, QUEUE, mode).await.unwrap();

            assert!(consumed.bodies.is_empty(), "{mode:?}");
            assert!(consumed.failures.is_empty(), "{mode:?}");
            assert!(backend.deletes().is_empty(), "{mode:?}");
            assert!(backend.visibility_changes().is_empty(), "{mode:?}");
        }
    });
}

#[test]
fn receive_failure_aborts_every_policy() {
    block_on(async {
        for mode in ALL_MODES {
            let error = QueueError::Unavailable("connection refused".to_string());
            let backend = ScriptedBackend::failing_receive(error.clone());

            let result = consume::consume(&backend, QUEUE, mode).await;

            assert_eq!(result, Err(error), "{mode:?}");
            assert_eq!(backend.calls().len(), 1, "only the receive is issued");
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fetch_only_issues_no_post_actions(bodies in arb_bodies()) {
        block_on(async {
            let backend = ScriptedBackend::with_bodies(&bodies);

            let consumed = consume::fetch_only(&backend, QUEUE).await.unwrap();

            prop_assert_eq!(&consumed.bodies, &bodies);
            prop_assert!(backend.deletes().is_empty());
            prop_assert!(backend.visibility_changes().is_empty());
            prop_assert_eq!(backend.receives(), vec![WaitMode::Immediate]);
            Ok(())
        })?;
    }

    #[test]
    fn prop_delete_failure_is_isolated(
        bodies in prop::collection::vec("[a-z0-9 ]{1,50}", 1..10usize),
        failing in any::<prop::sample::Index>(),
        long_poll in any::<bool>(),
    ) {
        block_on(async {
            let failing = failing.index(bodies.len());
            let backend = ScriptedBackend::with_bodies(&bodies).fail_post_action_for(failing);

            let consumed = if long_poll {
                consume::fetch_with_long_poll_and_delete(&backend, QUEUE).await
            } else {
                consume::fetch_and_delete(&backend, QUEUE).await
            }
            .unwrap();

            // every body comes back, every handle gets its own delete
            prop_assert_eq!(&consumed.bodies, &bodies);
            let expected: Vec<String> = (0..bodies.len()).map(receipt_handle).collect();
            prop_assert_eq!(backend.deletes(), expected);

            prop_assert_eq!(consumed.failures.len(), 1);
            let failure = &consumed.failures[0];
            prop_assert_eq!(&failure.receipt_handle, &receipt_handle(failing));
            prop_assert_eq!(failure.action, PostAction::Delete);
            prop_assert_eq!(
                &failure.error,
                &QueueError::StaleReceiptHandle(receipt_handle(failing))
            );
            Ok(())
        })?;
    }

    #[test]
    fn prop_visibility_hold_acts_on_first_message_only(
        bodies in prop::collection::vec("[a-z0-9 ]{1,50}", 2..10usize),
    ) {
        block_on(async {
            let backend = ScriptedBackend::with_bodies(&bodies);

            let consumed = consume::fetch_with_visibility_hold(&backend, QUEUE).await.unwrap();

            prop_assert_eq!(consumed.bodies, vec![bodies[0].clone()]);
            prop_assert!(consumed.failures.is_empty());
            prop_assert_eq!(
                backend.visibility_changes(),
                vec![(receipt_handle(0), VISIBILITY_HOLD_SECONDS)]
            );
            prop_assert!(backend.deletes().is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn prop_long_poll_always_waits(bodies in arb_bodies()) {
        block_on(async {
            let backend = ScriptedBackend::with_bodies(&bodies);

            consume::fetch_with_long_poll_and_delete(&backend, QUEUE).await.unwrap();

            prop_assert_eq!(
                backend.receives(),
                vec![WaitMode::LongPoll(LONG_POLL_WAIT_SECONDS)]
            );
            Ok(())
        })?;
    }

    #[test]
    fn prop_bodies_are_returned_unchanged(bodies in arb_bodies()) {
        block_on(async {
            let backend = ScriptedBackend::with_bodies(&bodies);

            let consumed = consume::consume(&backend, QUEUE, ConsumeMode::FetchAndDelete)
                .await
                .unwrap();

            prop_assert_eq!(consumed.bodies, bodies);
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn fetch_and_delete_three_messages() {
    let backend = ScriptedBackend::with_bodies(&["one", "two", "three"]);

    let consumed = consume::fetch_and_delete(&backend, QUEUE).await.unwrap();

    assert_eq!(consumed.bodies, vec!["one", "two", "three"]);
    assert_eq!(
        backend.deletes(),
        vec![receipt_handle(0), receipt_handle(1), receipt_handle(2)]
    );
    assert!(backend.visibility_changes().is_empty());
}

#[tokio::test]
async fn visibility_hold_on_empty_queue_does_nothing() {
    let backend = ScriptedBackend::empty();

    let consumed = consume::fetch_with_visibility_hold(&backend, QUEUE)
        .await
        .unwrap();

    assert!(consumed.bodies.is_empty());
    assert!(backend.visibility_changes().is_empty());
    assert!(backend.deletes().is_empty());
}

#[tokio::test]
async fn visibility_hold_on_single_message() {
    let backend = ScriptedBackend::with_bodies(&["hello"]);

    let consumed = consume::fetch_with_visibility_hold(&backend, QUEUE)
        .await
        .unwrap();

    assert_eq!(consumed.bodies, vec!["hello"]);
    assert_eq!(
        backend.visibility_changes(),
        vec![(receipt_handle(0), 5)]
    );
    assert!(backend.deletes().is_empty());
}

#[tokio::test]
async fn failed_visibility_hold_still_returns_the_body() {
    let backend = ScriptedBackend::with_bodies(&["hello", "world"]).fail_post_action_for(0);

    let consumed = consume::fetch_with_visibility_hold(&backend, QUEUE)
        .await
        .unwrap();

    assert_eq!(consumed.bodies, vec!["hello"]);
    assert_eq!(consumed.failures.len(), 1);
    assert_eq!(
        consumed.failures[0].action,
        PostAction::ChangeVisibility { timeout_seconds: 5 }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumers_see_each_message_once() {
    let queues = InMemoryQueues::new();
    let url = queues.create_queue("shared").await.unwrap();
    for i in 0..200 {
        queues.send_message(&url, &format!("message {i}")).await.unwrap();
    }

    let consumers: Vec<_> = (0..8)
        .map(|_| {
            let queues = queues.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let mut bodies = Vec::new();
                loop {
                    let consumed = consume::fetch_and_delete(&queues, &url).await.unwrap();
                    assert!(consumed.failures.is_empty(), "{:?}", consumed.failures);
                    if consumed.is_empty() {
                        return bodies;
                    }
                    bodies.extend(consumed.bodies);
                }
            })
        })
        .collect();

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }

    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(all.len(), 200);
    assert_eq!(unique.len(), 200);
    assert_eq!(queues.message_count(&url), 0);
}
