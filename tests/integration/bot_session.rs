//! End-to-end routing through a live bot and a loopback chat server.

use crate::helpers::*;
use chatvox::Bot;
use chatvox::WorkerState;

#[tokio::test]
async fn ping_is_answered_and_song_request_is_confirmed() {
    let music = music_dir(&["echo_song.mp3", "other.mp3"]);
    let config = config(music.path());
    let speech_log = SpeechLog::default();
    let audio_log = AudioLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(
            Some(speech_spawner(&config, None, speech_log.clone())),
            Some(playback_spawner(&config, audio_log.clone())),
        ),
        server.settings(),
    )
    .await
    .unwrap();
    assert_eq!(bot.speech_state(), Some(WorkerState::Serving));
    assert_eq!(bot.playback_state(), Some(WorkerState::Serving));

    let mut conn = server.accept().await;
    conn.send_raw("PING :tmi.twitch.tv").await;
    assert_eq!(conn.next_line().await.as_deref(), Some("PONG :tmi.twitch.tv"));

    conn.chat("bob", "!sr echo").await;
    assert_eq!(
        conn.next_line().await,
        Some(reply_line("echo_song has been added to the queue."))
    );
    wait_for(|| audio_log.lock().unwrap().as_slice() == ["echo_song"]).await;

    conn.chat("bob", "!sr nothing-like-this").await;
    assert_eq!(
        conn.next_line().await,
        Some(reply_line("A matching song was not found."))
    );

    // Song commands never reach the speech worker.
    assert!(speech_log.lock().unwrap().is_empty());

    bot.shutdown().await.unwrap();
}

#[tokio::test]
async fn chat_is_spoken_and_voice_change_is_confirmed() {
    let music = music_dir(&[]);
    let config = config(music.path());
    let speech_log = SpeechLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(Some(speech_spawner(&config, None, speech_log.clone())), None),
        server.settings(),
    )
    .await
    .unwrap();
    let mut conn = server.accept().await;

    conn.chat("alice", "look at https://example.com/x now").await;
    conn.chat("alice", "!voice fr 200").await;
    assert_eq!(
        conn.next_line().await,
        Some(reply_line("alice has changed voices"))
    );

    let spoken = speech_log.lock().unwrap().clone();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[0].2, "look at web link now");
    assert_eq!(
        spoken[1],
        (
            "TTS_MS_FR-FR_HORTENSE".to_owned(),
            200,
            "alice has changed voices".to_owned()
        )
    );

    bot.shutdown().await.unwrap();
}

#[tokio::test]
async fn playback_commands_are_spoken_without_a_playback_worker() {
    let music = music_dir(&["echo_song.mp3"]);
    let mut config = config(music.path());
    config.playback.enabled = false;
    let speech_log = SpeechLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(Some(speech_spawner(&config, None, speech_log.clone())), None),
        server.settings(),
    )
    .await
    .unwrap();
    assert_eq!(bot.playback_state(), None);
    let mut conn = server.accept().await;

    conn.chat("mod", "!skip").await;
    wait_for(|| speech_log.lock().unwrap().len() == 1).await;
    assert_eq!(speech_log.lock().unwrap()[0].2, "!skip");

    bot.shutdown().await.unwrap();
}

#[tokio::test]
async fn editor_commands_are_ignored_for_viewers() {
    let music = music_dir(&["a.mp3", "b.mp3"]);
    let config = config(music.path());
    let audio_log = AudioLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(None, Some(playback_spawner(&config, audio_log.clone()))),
        server.settings(),
    )
    .await
    .unwrap();
    let mut conn = server.accept().await;

    conn.chat("viewer", "!songs").await;
    conn.chat("mod", "!songs").await;
    assert_eq!(conn.next_line().await, Some(reply_line("1. a, 2. b")));

    // The bot's own nickname is always an editor.
    conn.chat(NICK, "!vol 30").await;
    assert_eq!(conn.next_line().await, Some(reply_line("Volume now set to 30")));

    bot.shutdown().await.unwrap();
}

#[tokio::test]
async fn server_hangup_terminates_the_bot() {
    let music = music_dir(&[]);
    let config = config(music.path());
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(Some(speech_spawner(&config, None, SpeechLog::default())), None),
        server.settings(),
    )
    .await
    .unwrap();
    let conn = server.accept().await;
    conn.hang_up();

    tokio::time::timeout(std::time::Duration::from_secs(5), bot.terminated())
        .await
        .expect("bot did not notice the hang-up");
    let result = bot.shutdown().await;
    assert!(matches!(result, Err(chatvox::BotError::Connection(_))));
    assert_eq!(bot.speech_state(), None);
}
