use super::*;
use std::sync::Arc;

#[test]
fn follow_up_mentions_both_questions() {
    let query = rewrite("What about v2?", Some("What is the latest version?"));
    assert!(query.contains("What about v2?"));
    assert!(query.contains("What is the latest version?"));
    assert_eq!(
        query,
        "What about v2? In the context of: What is the latest version?"
    );
}

#[test]
fn first_turn_is_unchanged() {
    assert_eq!(rewrite("Hello", Some("")), "Hello");
    assert_eq!(rewrite("Hello", Some("   ")), "Hello");
    assert_eq!(rewrite("Hello", None), "Hello");
}

#[test]
fn only_the_previous_question_is_used() {
    let history = vec![
        Turn::new("first question", "first answer"),
        Turn::new("second question", "second answer"),
    ];
    let query = effective_query(&history, "third question");

    assert!(query.contains("second question"));
    assert!(!query.contains("first question"));
    assert_eq!(effective_query(&[], "alone"), "alone");
}

#[test]
fn threads_are_isolated() {
    let store = ConversationStore::new();
    store.record("alice", Turn::new("How do I install it?", "Use cargo."));

    assert_eq!(
        store.effective_query("alice", "And on Windows?"),
        "And on Windows? In the context of: How do I install it?"
    );
    assert_eq!(store.effective_query("bob", "And on Windows?"), "And on Windows?");
    assert!(store.history("bob").is_empty());
    assert_eq!(store.thread_count(), 1);
}

#[test]
fn history_is_append_only_and_clearable() {
    let store = ConversationStore::new();
    store.record("t", Turn::new("q1", "a1"));
    store.record("t", Turn::new("q2", "a2"));

    let history = store.history("t");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].question, "q1");

    assert!(store.clear("t"));
    assert!(!store.clear("t"));
    assert!(store.history("t").is_empty());
}

#[test]
fn concurrent_threads_do_not_interfere() {
    let store = Arc::new(ConversationStore::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let thread = format!("thread-{}", i);
                for turn in 0..10 {
                    store.record(&thread, Turn::new(format!("q{}", turn), "a"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread should finish");
    }

    assert_eq!(store.thread_count(), 8);
    assert!((0..8).all(|i| store.history(&format!("thread-{}", i)).len() == 10));
}

#[test]
fn turns_survive_a_panicked_writer() {
    let store = Arc::new(ConversationStore::new());
    store.record("t", Turn::new("How do I install it?", "With cargo."));

    let writer = Arc::clone(&store);
    let result = std::thread::spawn(move || {
        let _guard = writer.threads.write().expect("lock is healthy");
        panic!("writer panicked while holding the lock");
    })
    .join();
    assert!(result.is_err());
    assert!(store.threads.is_poisoned());

    store.record("t", Turn::new("And on Windows?", "Also with cargo."));

    assert_eq!(store.history("t").len(), 2);
    assert_eq!(
        store.effective_query("t", "What about updates?"),
        "What about updates? In the context of: And on Windows?"
    );
    assert_eq!(store.thread_count(), 1);
    assert!(store.clear("t"));
}
