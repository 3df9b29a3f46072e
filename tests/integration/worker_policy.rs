//! Worker initialization failures under both session policies.

use crate::helpers::*;
use chatvox::bot::SpawnWorker;
use chatvox::{Bot, BotError, ReplySender, WorkerState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn failing_speech() -> SpawnWorker {
    Box::new(|replies: ReplySender| {
        chatvox::speech::spawn_with::<RecordingSpeech, _>(
            || Err(BotError::Tts("no voices installed".to_owned())),
            chatvox::speech::SpeechSettings {
                banned: Default::default(),
                rate_bounds: (120, 300),
                profiles_path: None,
            },
            replies,
            rand::SeedableRng::seed_from_u64(1),
        )
    })
}

#[tokio::test]
async fn failed_worker_is_skipped_by_default() {
    let music = music_dir(&["echo_song.mp3"]);
    let config = config(music.path());
    let audio_log = AudioLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(
            Some(failing_speech()),
            Some(playback_spawner(&config, audio_log.clone())),
        ),
        server.settings(),
    )
    .await
    .unwrap();
    assert_eq!(bot.speech_state(), None);
    assert_eq!(bot.playback_state(), Some(WorkerState::Serving));

    let mut conn = server.accept().await;
    conn.chat("alice", "this has nowhere to go").await;
    conn.chat("bob", "!sr echo").await;
    assert_eq!(
        conn.next_line().await,
        Some(reply_line("echo_song has been added to the queue."))
    );

    bot.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_worker_aborts_start_when_all_are_required() {
    let music = music_dir(&[]);
    let mut config = config(music.path());
    config.session.require_all_workers = true;
    let server = FakeServer::bind().await;

    let result = Bot::start_with(
        &config,
        spawners(
            Some(failing_speech()),
            Some(playback_spawner(&config, AudioLog::default())),
        ),
        server.settings(),
    )
    .await;

    match result {
        Err(BotError::Tts(msg)) => assert_eq!(msg, "no voices installed"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error_and_workers_are_stopped() {
    let music = music_dir(&[]);
    let state = tempfile::tempdir().unwrap();
    let profiles_path = state.path().join("voices.json");
    let config = config(music.path());
    let server = FakeServer::bind().await;
    let settings = server.settings();
    drop(server);

    let result = Bot::start_with(
        &config,
        spawners(
            Some(speech_spawner(
                &config,
                Some(profiles_path.clone()),
                SpeechLog::default(),
            )),
            None,
        ),
        settings,
    )
    .await;
    assert!(matches!(result, Err(BotError::Connection(_))));
    assert!(profiles_path.exists(), "speech worker was not shut down");
}

#[tokio::test(flavor = "current_thread")]
async fn worker_startup_leaves_the_runtime_free() {
    let music = music_dir(&[]);
    let mut config = config(music.path());
    config.session.require_all_workers = true;
    let server = FakeServer::bind().await;

    // Only runs if the single runtime thread is free while workers start.
    let ticked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ticked);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.store(true, Ordering::SeqCst);
    });

    let inner = speech_spawner(&config, None, SpeechLog::default());
    let waiting_speech: SpawnWorker = Box::new(move |replies: ReplySender| {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !ticked.load(Ordering::SeqCst) {
            if Instant::now() > deadline {
                return Err(BotError::Tts("runtime stalled during startup".to_owned()));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        inner(replies)
    });

    let mut bot = Bot::start_with(
        &config,
        spawners(Some(waiting_speech), None),
        server.settings(),
    )
    .await
    .unwrap();
    assert_eq!(bot.speech_state(), Some(WorkerState::Serving));
    let _conn = server.accept().await;

    bot.shutdown().await.unwrap();
}
