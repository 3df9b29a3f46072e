//! Shutdown ordering: replies already produced reach the channel before the
//! connection closes, and worker state is on disk by then.

use crate::helpers::*;
use chatvox::Bot;
use chatvox::speech::profiles::load_profiles;
use chatvox::speech::VoiceProfile;

#[tokio::test]
async fn shutdown_flushes_replies_then_closes_and_persists_profiles() {
    let music = music_dir(&["echo_song.mp3"]);
    let state = tempfile::tempdir().unwrap();
    let profiles_path = state.path().join("profiles").join("voices.json");
    let config = config(music.path());
    let speech_log = SpeechLog::default();
    let audio_log = AudioLog::default();
    let server = FakeServer::bind().await;

    let mut bot = Bot::start_with(
        &config,
        spawners(
            Some(speech_spawner(
                &config,
                Some(profiles_path.clone()),
                speech_log.clone(),
            )),
            Some(playback_spawner(&config, audio_log.clone())),
        ),
        server.settings(),
    )
    .await
    .unwrap();
    let mut conn = server.accept().await;

    conn.chat("alice", "!voice fr 200").await;
    conn.chat("bob", "!sr echo").await;
    conn.chat("mod", "!vol up").await;

    // Wait until both workers have handled their commands, then stop without
    // reading any of the replies first.
    wait_for(|| {
        speech_log.lock().unwrap().len() == 1 && !audio_log.lock().unwrap().is_empty()
    })
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    bot.shutdown().await.unwrap();

    let lines = conn.remaining_lines().await;
    assert_eq!(lines.len(), 3, "{lines:?}");
    assert!(lines.contains(&reply_line("alice has changed voices")));
    let song = lines
        .iter()
        .position(|l| *l == reply_line("echo_song has been added to the queue."))
        .unwrap();
    let volume = lines
        .iter()
        .position(|l| *l == reply_line("Volume now set to 60"))
        .unwrap();
    assert!(song < volume, "replies from one worker keep their order");

    let stored = load_profiles(&profiles_path);
    assert_eq!(stored.get("alice"), Some(&VoiceProfile::new(2, 200)));
}

#[tokio::test]
async fn profiles_survive_a_restart() {
    let music = music_dir(&[]);
    let state = tempfile::tempdir().unwrap();
    let profiles_path = state.path().join("voices.json");
    let config = config(music.path());

    for round in 0..2 {
        let speech_log = SpeechLog::default();
        let server = FakeServer::bind().await;
        let mut bot = Bot::start_with(
            &config,
            spawners(
                Some(speech_spawner(
                    &config,
                    Some(profiles_path.clone()),
                    speech_log.clone(),
                )),
                None,
            ),
            server.settings(),
        )
        .await
        .unwrap();
        let mut conn = server.accept().await;

        if round == 0 {
            conn.chat("alice", "!voice zira 250").await;
            assert_eq!(
                conn.next_line().await,
                Some(reply_line("alice has changed voices"))
            );
        } else {
            conn.chat("alice", "hello again").await;
            wait_for(|| !speech_log.lock().unwrap().is_empty()).await;
            let spoken = speech_log.lock().unwrap()[0].clone();
            assert_eq!(spoken.0, "TTS_MS_EN-US_ZIRA");
            assert_eq!(spoken.1, 250);
        }
        bot.shutdown().await.unwrap();
    }
}
