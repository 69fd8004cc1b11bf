//! Conversation session integration tests
//!
//! Drives the controller with mock agent, synthesizer, recognizer and
//! audio output.

use std::sync::Arc;
use std::time::Duration;

use cyrene_voice::agent::AgentRequest;
use cyrene_voice::session::{
    ConversationSession, InputMode, Message, PlaybackStatus, RejectReason, TurnOutcome,
};
use cyrene_voice::store::{CHAT_HISTORY_KEY, KvStore, TranscriptStore};

mod common;
use common::{
    AudioEvent, MockAgent, MockOutput, MockRecognizer, MockSynthesizer, listener, memory_store,
    voice_generator,
};

fn text_session(agent: MockAgent) -> (ConversationSession, Arc<MockAgent>, TranscriptStore) {
    let agent = Arc::new(agent);
    let (kv, store) = memory_store();
    let session = ConversationSession::builder(agent.clone(), store).build();
    (session, agent, TranscriptStore::new(kv))
}

#[tokio::test]
async fn test_text_turn_appends_user_then_assistant() {
    let (session, agent, store) = text_session(MockAgent::new().reply("hi there"));

    let outcome = session.submit("hello", "user-1", false).await;

    assert_eq!(outcome, TurnOutcome::Completed { audio: false });
    assert_eq!(
        session.messages(),
        vec![Message::user("hello"), Message::assistant("hi there", None)]
    );
    assert_eq!(
        agent.requests(),
        vec![AgentRequest {
            text: "hello".to_string(),
            user_id: "user-1".to_string(),
            voice_mode: false,
        }]
    );
    assert_eq!(store.load(), session.messages());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_failed_dispatch_restores_transcript() {
    let (session, _agent, store) =
        text_session(MockAgent::new().reply("first reply").fail("connection refused"));

    session.submit("first", "user-1", false).await;
    let before = session.messages();

    let outcome = session.submit("second", "user-1", false).await;

    assert!(matches!(outcome, TurnOutcome::RolledBack(ref e) if e.contains("connection refused")));
    assert_eq!(session.messages(), before);
    assert_eq!(store.load(), before);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_failed_first_turn_leaves_empty_transcript() {
    let (session, _agent, store) = text_session(MockAgent::new().fail("network error"));

    session.submit("hello", "user-1", false).await;

    assert!(session.messages().is_empty());
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_blank_text_is_rejected() {
    let (session, agent, _store) = text_session(MockAgent::new().reply("unused"));

    assert_eq!(
        session.submit("   ", "user-1", false).await,
        TurnOutcome::Rejected(RejectReason::EmptyText)
    );
    assert!(session.messages().is_empty());
    assert!(agent.requests().is_empty());
}

#[tokio::test]
async fn test_submit_while_in_flight_is_rejected() {
    let (session, agent, _store) = text_session(
        MockAgent::new()
            .reply("only reply")
            .delayed(Duration::from_millis(50)),
    );

    let (first, second) = tokio::join!(
        session.submit("first", "user-1", false),
        session.submit("second", "user-1", false),
    );

    assert_eq!(first, TurnOutcome::Completed { audio: false });
    assert_eq!(second, TurnOutcome::Rejected(RejectReason::InFlight));
    assert_eq!(agent.requests().len(), 1);
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_pending_user_message_is_visible_but_not_persisted() {
    let (session, _agent, store) = text_session(
        MockAgent::new()
            .reply("done")
            .delayed(Duration::from_millis(50)),
    );

    let observe = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.is_busy());
        assert_eq!(session.messages(), vec![Message::user("hello")]);
        assert!(store.load().is_empty());
    };

    let (outcome, ()) = tokio::join!(session.submit("hello", "user-1", false), observe);

    assert_eq!(outcome, TurnOutcome::Completed { audio: false });
    assert_eq!(store.load().len(), 2);
}

#[tokio::test]
async fn test_dropped_turn_rolls_back() {
    let (session, _agent, store) = text_session(
        MockAgent::new()
            .reply("too late")
            .delayed(Duration::from_secs(5)),
    );

    let result =
        tokio::time::timeout(Duration::from_millis(10), session.submit("hello", "user-1", false))
            .await;

    assert!(result.is_err());
    assert!(session.messages().is_empty());
    assert!(!session.is_busy());
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_submit_clears_draft_input() {
    let (session, _agent, _store) = text_session(MockAgent::new().reply("ok"));
    session.set_input("hello");

    session.submit("hello", "user-1", false).await;

    assert!(session.input().is_empty());
}

#[tokio::test]
async fn test_voice_turn_attaches_and_plays_audio() {
    let agent = Arc::new(MockAgent::new().reply("spoken reply"));
    let synth = Arc::new(MockSynthesizer::returning(b"ID3fake-mp3"));
    let (generator, _dir) = voice_generator(synth.clone());
    let output = MockOutput::new();
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent.clone(), store)
        .voice(generator)
        .output(Box::new(output.clone()))
        .voice_id("bf_emma")
        .build();

    let outcome = session.submit("hello", "user-1", true).await;

    assert_eq!(outcome, TurnOutcome::Completed { audio: true });
    assert!(agent.requests()[0].voice_mode);
    assert_eq!(synth.voices(), vec!["bf_emma".to_string()]);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    let handle = messages[1].audio.clone().expect("reply should carry audio");
    assert_eq!(std::fs::read(&handle).unwrap(), b"ID3fake-mp3");

    assert_eq!(
        output.events(),
        vec![AudioEvent::Open(handle.clone()), AudioEvent::Play(handle)]
    );
    assert_eq!(session.playing_index(), Some(1));
}

#[tokio::test]
async fn test_voice_turn_keeps_reply_when_synthesis_fails() {
    let agent = Arc::new(MockAgent::new().reply("text only"));
    let (generator, _dir) = voice_generator(Arc::new(MockSynthesizer::failing()));
    let output = MockOutput::new();
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent, store)
        .voice(generator)
        .output(Box::new(output.clone()))
        .build();

    let outcome = session.submit("hello", "user-1", true).await;

    assert_eq!(outcome, TurnOutcome::Completed { audio: false });
    assert_eq!(session.messages()[1], Message::assistant("text only", None));
    assert!(output.events().is_empty());
}

#[tokio::test]
async fn test_text_mode_does_not_synthesize() {
    let agent = Arc::new(MockAgent::new().reply("plain"));
    let synth = Arc::new(MockSynthesizer::returning(b"ID3"));
    let (generator, _dir) = voice_generator(synth.clone());
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent, store)
        .voice(generator)
        .build();

    session.submit("hello", "user-1", false).await;

    assert!(synth.voices().is_empty());
    assert_eq!(session.messages()[1].audio, None);
}

#[tokio::test]
async fn test_only_one_message_plays_at_a_time() {
    let agent = Arc::new(MockAgent::new().reply("one").reply("two"));
    let (generator, _dir) = voice_generator(Arc::new(MockSynthesizer::returning(b"ID3")));
    let output = MockOutput::new();
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent, store)
        .voice(generator)
        .output(Box::new(output.clone()))
        .build();

    session.submit("first", "user-1", true).await;
    session.submit("second", "user-1", true).await;

    let messages = session.messages();
    let first = messages[1].audio.clone().unwrap();
    let second = messages[3].audio.clone().unwrap();

    // The second reply took the slot from the first
    assert!(output.events().contains(&AudioEvent::Stop(first.clone())));
    assert_eq!(session.playing_index(), Some(3));

    // Same index twice: pause, then resume
    output.clear();
    assert_eq!(session.toggle_audio_playback(3), PlaybackStatus::Paused);
    assert_eq!(session.playing_index(), None);
    assert_eq!(session.toggle_audio_playback(3), PlaybackStatus::Playing);
    assert_eq!(
        output.events(),
        vec![
            AudioEvent::Pause(second.clone()),
            AudioEvent::Play(second.clone())
        ]
    );

    // Another index stops the current one before starting
    output.clear();
    assert_eq!(session.toggle_audio_playback(1), PlaybackStatus::Playing);
    let events = output.events();
    let stopped = events
        .iter()
        .position(|e| *e == AudioEvent::Stop(second.clone()))
        .unwrap();
    let started = events
        .iter()
        .position(|e| *e == AudioEvent::Play(first.clone()))
        .unwrap();
    assert!(stopped < started);
    assert_eq!(session.playing_index(), Some(1));
}

#[tokio::test]
async fn test_toggle_playback_without_audio() {
    let (session, _agent, _store) = text_session(MockAgent::new().reply("no audio"));
    session.submit("hello", "user-1", false).await;

    assert_eq!(session.toggle_audio_playback(0), PlaybackStatus::Unavailable);
    assert_eq!(session.toggle_audio_playback(1), PlaybackStatus::Unavailable);
    assert_eq!(session.toggle_audio_playback(7), PlaybackStatus::Unavailable);
}

#[tokio::test]
async fn test_voice_mode_submits_recognized_speech() {
    let agent = Arc::new(MockAgent::new().reply("sunny"));
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent.clone(), store)
        .listener(listener(MockRecognizer::hearing("what is the weather")))
        .user_id("voice-user")
        .build();

    assert_eq!(session.toggle_voice_mode(), InputMode::Voice);
    assert!(session.state().is_recording);

    let outcome = session.run_capture().await;

    assert_eq!(outcome, Some(TurnOutcome::Completed { audio: false }));
    assert_eq!(
        agent.requests(),
        vec![AgentRequest {
            text: "what is the weather".to_string(),
            user_id: "voice-user".to_string(),
            voice_mode: true,
        }]
    );

    let state = session.state();
    assert_eq!(state.mode, InputMode::Voice);
    assert!(!state.is_recording);
    assert!(state.last_transcript.is_empty());
}

#[tokio::test]
async fn test_recognized_speech_forces_voice_mode() {
    let agent = Arc::new(MockAgent::new().reply("ok"));
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent.clone(), store)
        .listener(listener(MockRecognizer::hearing("turn on the lights")))
        .build();

    // Capture while the session is still in text mode
    assert!(session.toggle_recording());
    session.run_capture().await;

    assert_eq!(session.state().mode, InputMode::Text);
    assert!(agent.requests()[0].voice_mode);
}

#[tokio::test]
async fn test_leaving_voice_mode_discards_capture() {
    let agent = Arc::new(MockAgent::new().reply("unused"));
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent.clone(), store)
        .listener(listener(
            MockRecognizer::hearing("too late").after(Duration::from_secs(5)),
        ))
        .build();

    session.toggle_voice_mode();
    assert_eq!(session.toggle_voice_mode(), InputMode::Text);
    assert!(!session.state().is_recording);

    let outcome = session.run_capture().await;

    assert_eq!(outcome, None);
    assert!(agent.requests().is_empty());
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_silent_capture_submits_nothing() {
    let agent = Arc::new(MockAgent::new().reply("unused"));
    let (_kv, store) = memory_store();

    let session = ConversationSession::builder(agent.clone(), store)
        .listener(listener(MockRecognizer::silent()))
        .build();

    session.toggle_voice_mode();
    assert_eq!(session.run_capture().await, None);
    assert!(agent.requests().is_empty());
    assert!(!session.state().is_recording);
}

#[tokio::test]
async fn test_voice_mode_without_recognizer() {
    let (session, _agent, _store) = text_session(MockAgent::new());
    session.set_input("draft");

    assert_eq!(session.toggle_voice_mode(), InputMode::Voice);
    assert!(session.state().is_voice_mode_active());
    assert!(!session.state().is_recording);
    assert!(session.input().is_empty());
    assert!(!session.toggle_recording());
}

#[tokio::test]
async fn test_history_restored_on_build() {
    let (kv, store) = memory_store();
    let history = vec![Message::user("earlier"), Message::assistant("reply", None)];
    store.save(&history);

    let session =
        ConversationSession::builder(Arc::new(MockAgent::new()), TranscriptStore::new(kv)).build();

    assert_eq!(session.messages(), history);
}

#[tokio::test]
async fn test_corrupt_history_loads_empty() {
    let (kv, store) = memory_store();
    kv.set(CHAT_HISTORY_KEY, "{not json").unwrap();

    let session = ConversationSession::builder(Arc::new(MockAgent::new()), store).build();

    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_clear_history() {
    let (session, _agent, store) = text_session(MockAgent::new().reply("hi"));
    session.submit("hello", "user-1", false).await;

    assert!(session.clear_history());

    assert!(session.messages().is_empty());
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_clear_history_purges_cached_audio() {
    let agent = Arc::new(MockAgent::new().reply("one").reply("two"));
    let (generator, dir) = voice_generator(Arc::new(MockSynthesizer::returning(b"ID3")));
    let output = MockOutput::new();
    let (_kv, store) = memory_store();
    let session = ConversationSession::builder(agent, store)
        .voice(generator)
        .output(Box::new(output.clone()))
        .build();

    session.submit("first", "user-1", true).await;
    session.submit("second", "user-1", true).await;
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

    assert!(session.clear_history());

    assert!(session.messages().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_clear_history_refused_while_in_flight() {
    let (session, _agent, _store) = text_session(
        MockAgent::new()
            .reply("hi")
            .delayed(Duration::from_millis(50)),
    );

    let attempt = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.clear_history()
    };

    let (outcome, cleared) = tokio::join!(session.submit("hello", "user-1", false), attempt);

    assert!(!cleared);
    assert_eq!(outcome, TurnOutcome::Completed { audio: false });
    assert_eq!(session.messages().len(), 2);
}
