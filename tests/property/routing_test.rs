// tests/property/routing_test.rs

//! Property-based tests for routing invariants
//! Tests that delivered envelopes always name their real sender and that
//! envelopes reach their target and nobody else.

use crate::test_helpers::{TestContext, flush};
use proptest::prelude::*;
use spinelrelay::core::{Envelope, EnvelopeKind};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_from_is_always_the_registered_sender(
        sender in "[a-z]{1,12}",
        forged_from in ".{0,40}",
        data in ".{0,200}",
        tag in prop_oneof![Just("chat".to_string()), "[a-z_]{1,16}"],
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new().await;
            let recipient_id = format!("{sender}-peer");
            let mut sender_client = ctx.connect(&sender, None).await;
            let mut recipient = ctx.connect(&recipient_id, None).await;
            sender_client.expect_join(&recipient_id).await;

            sender_client.send(Envelope {
                kind: EnvelopeKind::from(tag.clone()),
                data: data.clone(),
                from: forged_from.clone(),
                to: recipient_id.clone(),
                name: String::new(),
            });

            let received = recipient.recv().await;
            assert_eq!(received.from, sender);
            assert_eq!(received.to, recipient_id);
            assert_eq!(received.data, data);
            assert_eq!(received.kind.as_str(), tag);

            flush(&sender_client, &mut recipient).await;
            sender_client.assert_silent();
        });
    }

    #[test]
    fn test_only_the_target_receives(
        client_count in 2usize..6,
        target_index in 0usize..6,
        data in "[ -~]{0,64}",
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new().await;
            let mut clients = Vec::new();
            for i in 0..client_count {
                let client = ctx.connect(&format!("client-{i}"), None).await;
                clients.push(client);
            }
            // Drain every join notice each client saw after its own.
            for (i, client) in clients.iter_mut().enumerate() {
                for later in (i + 1)..client_count {
                    client.expect_join(&format!("client-{later}")).await;
                }
            }

            let target = target_index % client_count;
            let sender = (target + 1) % client_count;
            let target_id = clients[target].id.clone();
            clients[sender].chat(&target_id, &data);

            let received = clients[target].recv().await;
            assert_eq!(received.data, data);
            assert_eq!(received.from, clients[sender].id);

            // A marker through the same path proves routing of the first envelope finished.
            clients[sender].chat(&target_id, "marker");
            assert_eq!(clients[target].recv().await.data, "marker");

            for client in clients.iter_mut() {
                client.assert_silent();
            }
        });
    }

    #[test]
    fn test_untargeted_envelopes_are_never_delivered(
        payloads in prop::collection::vec(".{0,32}", 1..10),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new().await;
            let mut alice = ctx.connect("alice", None).await;
            let mut bob = ctx.connect("bob", None).await;
            alice.expect_join("bob").await;

            for payload in &payloads {
                alice.chat("", payload);
            }
            flush(&alice, &mut bob).await;

            alice.assert_silent();
            bob.assert_silent();
        });
    }
}
