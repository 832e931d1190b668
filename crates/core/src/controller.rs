//! Turn Controller
//!
//! The session state machine. It owns the speech output port and the voice
//! input session, consumes every [`SessionInput`] in order, and answers with
//! the [`Command`]s the runtime must execute: generation requests, timers and
//! reports. It never awaits anything itself, so every interleaving of device
//! callbacks, generation results and user actions can be replayed in a test.

use crate::{
    Command,
    config::SessionConfig,
    content::{Generated, GenerationRequest, Scene, Stage},
    drill::{DrillRound, Verdict},
    error::{GenerationFailure, RecognitionFailure},
    events::{GenerationToken, SessionInput, SessionReport, Timer, UserAction},
    language::{Language, Locale},
    speech::{SpeechEvent, SpeechOutputPort, SpeechSynthesizer},
    story::{StoryPhase, StoryRun},
    vocab::{StoryTone, VocabItem, Word},
    voice_input::{ListenState, RecognitionEngine, VoiceEvent, VoiceInputSession},
};
use std::time::Duration;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_secs(1);

enum Mode {
    Idle,
    Drill(DrillRound),
    AwaitingTone(Vec<VocabItem>),
    Story(StoryRun),
    Disposed,
}

pub struct TurnController {
    config: SessionConfig,
    speech: SpeechOutputPort,
    voice: VoiceInputSession,
    mode: Mode,
    token: GenerationToken,
    // Last values reported upward.
    speaking: bool,
    listening: ListenState,
    out: Vec<Command>,
}

impl TurnController {
    /// Creates a controller. Either device may be missing; the session then
    /// runs without speech and/or without voice input.
    pub fn new(
        config: SessionConfig,
        synthesizer: Option<Box<dyn SpeechSynthesizer>>,
        engine: Option<Box<dyn RecognitionEngine>>,
    ) -> Self {
        let speech = SpeechOutputPort::new(synthesizer, config.speech_rate, config.speech_pitch);
        let voice = VoiceInputSession::new(engine, config.listen_window_secs);
        info!(
            speech = speech.is_available(),
            voice_input = voice.is_available(),
            "Session devices attached"
        );
        Self {
            config,
            speech,
            voice,
            mode: Mode::Idle,
            token: GenerationToken::default(),
            speaking: false,
            listening: ListenState::Idle,
            out: Vec::new(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.mode, Mode::Disposed)
    }

    /// Applies one input and returns the commands it produced.
    pub fn handle(&mut self, input: SessionInput) -> Vec<Command> {
        if self.is_disposed() {
            debug!(?input, "Session disposed, dropping input");
            return Vec::new();
        }

        match input {
            SessionInput::StartDrill { items, pool } => self.start_drill(items, pool),
            SessionInput::Action(action) => self.on_action(action),
            SessionInput::Speech { utterance, event } => {
                match self.speech.handle(utterance, event) {
                    Some(SpeechEvent::Failed(id, reason)) => {
                        warn!(utterance = id.0, %reason, "Speech synthesis failed");
                    }
                    Some(event) => debug!(?event, "Speech progress"),
                    None => {}
                }
            }
            SessionInput::VoicesChanged(voices) => self.speech.set_voices(voices),
            SessionInput::Recognition { attempt, event } => {
                let events = self.voice.handle(attempt, event);
                self.on_voice_events(events);
            }
            SessionInput::Generated { token, outcome } => {
                if token != self.token {
                    debug!(?token, current = ?self.token, "Discarding stale generation result");
                } else {
                    self.on_generated(outcome);
                }
            }
            SessionInput::Illustrated {
                token,
                target_form,
                illustration,
            } => {
                if token != self.token {
                    debug!(%target_form, "Discarding stale illustration");
                } else if let Mode::Drill(round) = &mut self.mode
                    && round.set_illustration(&target_form, illustration)
                {
                    self.report_drill_item();
                }
            }
            SessionInput::TimerFired { token, timer } => {
                if token != self.token {
                    debug!(?timer, "Discarding stale timer");
                } else {
                    self.on_timer(timer);
                }
            }
        }

        self.flush()
    }

    /// Stops speech, aborts listening and invalidates every pending result.
    /// Safe to call more than once.
    pub fn dispose(&mut self) -> Vec<Command> {
        if self.is_disposed() {
            return Vec::new();
        }
        info!("Disposing session");
        self.speech.stop();
        self.voice.abort();
        self.token.bump();
        self.sync_flags();
        self.mode = Mode::Disposed;
        self.report(SessionReport::Disposed);
        std::mem::take(&mut self.out)
    }

    fn flush(&mut self) -> Vec<Command> {
        self.sync_flags();
        std::mem::take(&mut self.out)
    }

    /// Reports speaking/listening changes. The port and the voice session are
    /// the only sources of truth; the controller only mirrors them.
    fn sync_flags(&mut self) {
        let speaking = self.speech.is_speaking();
        if speaking != self.speaking {
            self.speaking = speaking;
            self.report(SessionReport::SpeakingChanged { speaking });
        }
        let listening = self.voice.state();
        if listening != self.listening {
            self.listening = listening;
            self.report(SessionReport::ListeningChanged { state: listening });
        }
    }

    fn report(&mut self, report: SessionReport) {
        self.out.push(Command::Report(report));
    }

    fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.out.push(Command::Schedule {
            token: self.token,
            delay,
            timer,
        });
    }

    fn generate(&mut self, request: GenerationRequest) {
        self.speech.stop();
        let token = self.token.bump();
        info!(stage = ?request.stage(), ?token, "Requesting generation");
        self.report(SessionReport::Generating {
            stage: request.stage(),
        });
        self.out.push(Command::Generate { token, request });
    }

    fn say(&mut self, text: &str, language: Language) {
        self.speech.speak(text, &language.locale());
    }

    fn notice(&mut self, text: &str, language: Language) {
        self.report(SessionReport::Notice {
            text: text.to_string(),
        });
        self.say(text, language);
    }

    /// Stops any speech before listening; the two never overlap.
    fn listen(&mut self, locale: Locale) {
        if !self.voice.can_start() {
            debug!(state = ?self.voice.state(), "Voice input busy, ignoring listen");
            return;
        }
        self.speech.stop();
        let events = self.voice.start(&locale);
        self.on_voice_events(events);
    }

    /// The language of the current mode's prompts and listening.
    fn language(&self) -> Language {
        match self.mode {
            Mode::Story(_) => self.config.story_language,
            _ => self.config.native_language,
        }
    }

    // --- Drill ---

    fn start_drill(&mut self, items: Vec<VocabItem>, pool: Vec<Word>) {
        self.speech.stop();
        self.voice.abort();
        self.token.bump();
        info!(items = items.len(), pool = pool.len(), "Starting drill round");
        self.mode = Mode::Drill(DrillRound::new(items, pool));
        self.present_drill_item();
    }

    /// Shows and speaks the current item, or completes the round.
    fn present_drill_item(&mut self) {
        let Mode::Drill(round) = &self.mode else {
            return;
        };
        match round.current() {
            Some(state) => {
                let native_form = state.item.native_form.clone();
                self.report_drill_item();
                self.say(&native_form, self.config.native_language);
            }
            None => {
                let items = round.collected().to_vec();
                info!(collected = items.len(), "Drill round complete");
                self.token.bump();
                self.report(SessionReport::RoundComplete {
                    items: items.clone(),
                });
                self.mode = Mode::AwaitingTone(items);
            }
        }
    }

    fn report_drill_item(&mut self) {
        let Mode::Drill(round) = &self.mode else {
            return;
        };
        let Some(state) = round.current() else {
            return;
        };
        let report = SessionReport::DrillItem {
            position: round.position(),
            round_size: round.round_size(),
            item: state.item.clone(),
            attempt_count: state.attempt_count,
            can_skip: state.can_skip(self.config.skip_threshold),
        };
        self.report(report);
    }

    fn evaluate_drill(&mut self, transcript: &str) {
        let threshold = self.config.skip_threshold;
        let language = self.config.native_language;
        let phrases = language.phrases();
        let Mode::Drill(round) = &mut self.mode else {
            return;
        };
        let Some(state) = round.current_mut() else {
            return;
        };

        if transcript.is_empty() {
            state.cancel_attempt();
            self.notice(phrases.didnt_hear, language);
            return;
        }

        let verdict = state.record(transcript);
        let report = SessionReport::Verdict {
            verdict,
            attempt_count: state.attempt_count,
            can_skip: state.can_skip(threshold),
        };
        let position = round.position();
        info!(%transcript, ?verdict, position, "Drill answer evaluated");
        self.report(report);

        if verdict == Verdict::Correct {
            self.say(phrases.affirmation, language);
            self.schedule(self.config.settle_delay, Timer::AdvanceDrill { position });
        } else {
            self.say(phrases.retry, language);
            self.report(SessionReport::Transcript {
                text: String::new(),
                is_final: false,
            });
        }
    }

    fn advance_drill(&mut self, position: usize) {
        let Mode::Drill(round) = &mut self.mode else {
            return;
        };
        if round.position() != position {
            return;
        }
        round.advance();
        self.present_drill_item();
    }

    fn skip_word(&mut self) {
        let threshold = self.config.skip_threshold;
        let Mode::Drill(round) = &mut self.mode else {
            return;
        };
        let Some(state) = round.swap(threshold) else {
            debug!("Skip not available yet");
            return;
        };
        let target_form = state.item.target_form.clone();
        info!(%target_form, "Swapped drill word");
        self.voice.abort();
        self.out.push(Command::Illustrate {
            token: self.token,
            target_form,
        });
        self.present_drill_item();
    }

    // --- Story ---

    fn begin_story(&mut self, tone: StoryTone) {
        let Mode::AwaitingTone(items) = &self.mode else {
            debug!("Story requested before the round finished");
            return;
        };
        let language = self.config.story_language;
        let vocabulary = items
            .iter()
            .map(|item| item.form_for(language).to_string())
            .collect();
        self.voice.abort();
        let story = StoryRun::new(tone, vocabulary, self.config.story_scenes);
        let request = story.opening_request();
        info!(?tone, scenes = story.total_scenes(), "Starting story");
        self.mode = Mode::Story(story);
        self.generate(request);
    }

    fn continue_story(&mut self, input: &str) {
        let Mode::Story(story) = &mut self.mode else {
            return;
        };
        if let Some(request) = story.continue_with(input) {
            self.voice.abort();
            self.generate(request);
        }
    }

    fn on_generated(&mut self, outcome: Result<Generated, GenerationFailure>) {
        let language = self.config.story_language;
        let Mode::Story(story) = &mut self.mode else {
            return;
        };

        match story.phase() {
            StoryPhase::Generating(index) => {
                let stage = if index == 1 {
                    Stage::Opening
                } else if index >= story.total_scenes() {
                    Stage::Closing
                } else {
                    Stage::Continuation
                };
                let scene = match outcome {
                    Ok(Generated::Scene(scene)) => scene,
                    Ok(Generated::Title(_)) => {
                        warn!(?stage, "Expected a scene, got a title; using fallback");
                        Scene::fallback(stage, language)
                    }
                    Err(failure) => {
                        warn!(?stage, %failure, "Scene generation failed; using fallback");
                        Scene::fallback(stage, language)
                    }
                };
                story.accept_scene(scene);
                let Some(appended) = story.current().cloned() else {
                    return;
                };
                // The closing scene is narrated once the title is in.
                let title_request = story.title_request();
                let narrate = title_request.is_none() && story.mark_spoken(appended.sequence_index);

                self.report(SessionReport::SceneAppended {
                    scene: appended.clone(),
                });
                if let Some(request) = title_request {
                    self.generate(request);
                } else if narrate {
                    self.say(&appended.narrative_text, language);
                }
            }
            StoryPhase::Titling => {
                let title = match outcome {
                    Ok(Generated::Title(title)) => title,
                    other => {
                        warn!(?other, "Title generation failed; using fallback");
                        language.phrases().fallback_title.to_string()
                    }
                };
                story.finish();
                let scenes = story.scenes().to_vec();
                let closing = story
                    .current()
                    .map(|scene| (scene.sequence_index, scene.narrative_text.clone()))
                    .filter(|(index, _)| story.mark_spoken(*index))
                    .map(|(_, text)| text);
                info!(%title, scenes = scenes.len(), "Story finished");
                self.token.bump();
                self.report(SessionReport::StoryFinished { title, scenes });
                if let Some(text) = closing {
                    self.say(&text, language);
                }
            }
            StoryPhase::AwaitingInput | StoryPhase::Finished => {
                debug!("Generation result arrived with nothing pending");
            }
        }
    }

    // --- Actions, timers and voice ---

    fn on_action(&mut self, action: UserAction) {
        debug!(?action, "User action");
        match action {
            UserAction::Listen => self.on_listen(),
            UserAction::StopListening => self.voice.stop(),
            UserAction::Replay => self.replay(),
            UserAction::SkipWord => self.skip_word(),
            UserAction::BeginStory { tone } => self.begin_story(tone),
            UserAction::Choose { choice } => self.continue_story(&choice),
            UserAction::PreviewChoice { index } => {
                if self.voice.state() != ListenState::Idle {
                    return;
                }
                let choice = match &self.mode {
                    Mode::Story(story) => story
                        .current()
                        .and_then(|scene| scene.choices.get(index))
                        .cloned(),
                    _ => None,
                };
                if let Some(choice) = choice {
                    self.say(&choice, self.config.story_language);
                }
            }
            UserAction::GoHome => {
                let commands = self.dispose();
                self.out.extend(commands);
            }
        }
    }

    fn on_listen(&mut self) {
        let locale = match &self.mode {
            Mode::Drill(round) => match round.current() {
                Some(state) if state.verdict != Verdict::Correct => {
                    self.config.native_language.locale()
                }
                _ => return,
            },
            Mode::Story(story) if story.phase() == StoryPhase::AwaitingInput => {
                self.config.story_language.locale()
            }
            _ => return,
        };
        self.listen(locale);
    }

    fn replay(&mut self) {
        if self.voice.state() != ListenState::Idle {
            return;
        }
        if self.speech.is_speaking() {
            self.speech.stop();
            return;
        }
        let (text, language) = match &self.mode {
            Mode::Drill(round) => match round.current() {
                Some(state) => (state.item.native_form.clone(), self.config.native_language),
                None => return,
            },
            Mode::Story(story) if !story.is_generating() => match story.current() {
                Some(scene) => (scene.narrative_text.clone(), self.config.story_language),
                None => return,
            },
            _ => return,
        };
        self.say(&text, language);
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::AdvanceDrill { position } => self.advance_drill(position),
            Timer::ListenTick { attempt } => {
                let events = self.voice.tick(attempt);
                self.on_voice_events(events);
            }
        }
    }

    fn on_voice_events(&mut self, events: Vec<VoiceEvent>) {
        for event in events {
            match event {
                VoiceEvent::Listening { attempt, seconds } => {
                    if let Mode::Drill(round) = &mut self.mode
                        && let Some(state) = round.current_mut()
                    {
                        state.begin_attempt();
                    }
                    self.report(SessionReport::Transcript {
                        text: String::new(),
                        is_final: false,
                    });
                    self.report(SessionReport::Countdown { seconds });
                    self.schedule(TICK, Timer::ListenTick { attempt });
                }
                VoiceEvent::Countdown(seconds) => {
                    self.report(SessionReport::Countdown { seconds });
                    if seconds > 0
                        && let Some(attempt) = self.voice.attempt()
                    {
                        self.schedule(TICK, Timer::ListenTick { attempt });
                    }
                }
                VoiceEvent::Interim(text) => self.report(SessionReport::Transcript {
                    text,
                    is_final: false,
                }),
                VoiceEvent::Final(text) => {
                    self.report(SessionReport::Transcript {
                        text: text.clone(),
                        is_final: true,
                    });
                    self.on_final(&text);
                    self.voice.finish_evaluation();
                }
                VoiceEvent::Idle => {}
                VoiceEvent::Failed(failure) => self.on_recognition_failed(failure),
            }
        }
    }

    fn on_final(&mut self, text: &str) {
        if matches!(self.mode, Mode::Drill(_)) {
            self.evaluate_drill(text);
        } else if !matches!(self.mode, Mode::Story(_)) {
            debug!(%text, "Transcript with nothing to evaluate");
        } else if text.is_empty() {
            let language = self.config.story_language;
            self.notice(language.phrases().didnt_hear, language);
        } else {
            self.continue_story(text);
        }
    }

    fn on_recognition_failed(&mut self, failure: RecognitionFailure) {
        if let Mode::Drill(round) = &mut self.mode
            && let Some(state) = round.current_mut()
        {
            state.cancel_attempt();
        }
        let language = self.language();
        let phrases = language.phrases();
        let prompt = match failure {
            RecognitionFailure::NoSpeech => phrases.didnt_hear,
            _ => phrases.recognition_failed,
        };
        self.report(SessionReport::RecognitionFailed { failure });
        self.notice(prompt, language);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        speech::{SynthesisEvent, Utterance, UtteranceId},
        voice_input::{AttemptId, RecognitionEvent, TranscriptEvent},
    };
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Devices {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Devices {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }
    }

    impl SpeechSynthesizer for Devices {
        fn speak(&mut self, utterance: &Utterance) {
            self.log
                .lock()
                .unwrap()
                .push(format!("speak:{}:{}", utterance.id.0, utterance.text));
        }

        fn cancel(&mut self) {
            self.log.lock().unwrap().push("cancel".to_string());
        }
    }

    impl RecognitionEngine for Devices {
        fn start(&mut self, attempt: AttemptId, locale: &Locale) -> Result<(), RecognitionFailure> {
            self.log
                .lock()
                .unwrap()
                .push(format!("listen:{}:{locale}", attempt.0));
            Ok(())
        }

        fn stop(&mut self, attempt: AttemptId) {
            self.log.lock().unwrap().push(format!("stop:{}", attempt.0));
        }

        fn abort(&mut self, attempt: AttemptId) {
            self.log.lock().unwrap().push(format!("abort:{}", attempt.0));
        }
    }

    fn item(thai: &str, english: &str) -> VocabItem {
        VocabItem::new(
            &Word {
                thai: thai.to_string(),
                english: english.to_string(),
            },
            format!("img:{english}"),
        )
    }

    fn round() -> Vec<VocabItem> {
        vec![
            item("สุนัข", "dog"),
            item("แมว", "cat"),
            item("นก", "bird"),
            item("ปลา", "fish"),
            item("ช้าง", "elephant"),
        ]
    }

    fn controller() -> (TurnController, Devices) {
        let devices = Devices::default();
        let controller = TurnController::new(
            SessionConfig::default(),
            Some(Box::new(devices.clone())),
            Some(Box::new(devices.clone())),
        );
        (controller, devices)
    }

    fn reports(commands: &[Command]) -> Vec<SessionReport> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::Report(report) => Some(report.clone()),
                _ => None,
            })
            .collect()
    }

    fn listen(controller: &mut TurnController) -> (AttemptId, Vec<Command>) {
        let commands = controller.handle(SessionInput::Action(UserAction::Listen));
        let attempt = commands
            .iter()
            .find_map(|command| match command {
                Command::Schedule {
                    timer: Timer::ListenTick { attempt },
                    ..
                } => Some(*attempt),
                _ => None,
            })
            .expect("listening should schedule a countdown tick");
        (attempt, commands)
    }

    /// Listens and delivers one final transcript, then the engine's end.
    fn answer(controller: &mut TurnController, text: &str) -> Vec<Command> {
        let (attempt, mut commands) = listen(controller);
        commands.extend(controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Result(TranscriptEvent {
                text: text.to_string(),
                is_final: true,
            }),
        }));
        commands.extend(controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::End,
        }));
        commands
    }

    fn fire_advance(controller: &mut TurnController, commands: &[Command]) -> Vec<Command> {
        let (token, timer) = commands
            .iter()
            .find_map(|command| match command {
                Command::Schedule {
                    token,
                    timer: timer @ Timer::AdvanceDrill { .. },
                    ..
                } => Some((*token, *timer)),
                _ => None,
            })
            .expect("a correct answer should schedule the advance");
        controller.handle(SessionInput::TimerFired { token, timer })
    }

    fn generation(commands: &[Command]) -> (GenerationToken, GenerationRequest) {
        commands
            .iter()
            .find_map(|command| match command {
                Command::Generate { token, request } => Some((*token, request.clone())),
                _ => None,
            })
            .expect("expected a generation request")
    }

    fn finish_round(controller: &mut TurnController) -> Vec<Command> {
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let mut last = Vec::new();
        for item in round() {
            let commands = answer(controller, &format!("it's a {}", item.target_form));
            last = fire_advance(controller, &commands);
        }
        last
    }

    fn scene(text: &str) -> Generated {
        Generated::Scene(Scene {
            text: text.to_string(),
            illustration: None,
            choices: vec!["left".to_string(), "right".to_string(), "up".to_string()],
        })
    }

    #[test]
    fn test_round_completes_with_items_in_order() {
        let (mut controller, _) = controller();
        let commands = finish_round(&mut controller);

        let complete = reports(&commands)
            .into_iter()
            .find_map(|report| match report {
                SessionReport::RoundComplete { items } => Some(items),
                _ => None,
            })
            .expect("round should complete");
        assert_eq!(complete, round());
    }

    #[test]
    fn test_correct_answer_speaks_affirmation_then_next_word() {
        let (mut controller, devices) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        assert_eq!(devices.take(), vec!["speak:1:สุนัข"]);

        let commands = answer(&mut controller, "สุนัข");
        // Listening cancels the prompt first.
        assert_eq!(
            devices.take(),
            vec!["cancel", "listen:1:th-TH", "stop:1", "speak:2:เก่งมาก! ถูกต้องแล้ว"]
        );
        assert!(reports(&commands).contains(&SessionReport::Verdict {
            verdict: Verdict::Correct,
            attempt_count: 0,
            can_skip: false,
        }));

        // Listening again while waiting to advance is ignored.
        assert!(controller
            .handle(SessionInput::Action(UserAction::Listen))
            .is_empty());

        fire_advance(&mut controller, &commands);
        assert_eq!(devices.take(), vec!["cancel", "speak:3:แมว"]);
    }

    #[test]
    fn test_skip_only_after_threshold_misses() {
        let (mut controller, _) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: vec![Word {
                thai: "ต้นไม้".to_string(),
                english: "tree".to_string(),
            }],
        });

        for attempt in 1..=3u32 {
            let skipped = controller.handle(SessionInput::Action(UserAction::SkipWord));
            assert!(
                !skipped.iter().any(|c| matches!(c, Command::Illustrate { .. })),
                "skip must do nothing before the threshold"
            );
            let commands = answer(&mut controller, "banana");
            assert!(reports(&commands).contains(&SessionReport::Verdict {
                verdict: Verdict::Incorrect,
                attempt_count: attempt,
                can_skip: attempt >= 3,
            }));
        }

        let commands = controller.handle(SessionInput::Action(UserAction::SkipWord));
        assert!(commands.iter().any(|command| matches!(
            command,
            Command::Illustrate { target_form, .. } if target_form == "tree"
        )));
        let item = reports(&commands)
            .into_iter()
            .find_map(|report| match report {
                SessionReport::DrillItem {
                    item,
                    position,
                    attempt_count,
                    ..
                } => Some((item, position, attempt_count)),
                _ => None,
            })
            .unwrap();
        assert_eq!(item.0.target_form, "tree");
        assert_eq!((item.1, item.2), (0, 0));
    }

    #[test]
    fn test_empty_transcript_is_not_an_attempt() {
        let (mut controller, _) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let (attempt, _) = listen(&mut controller);
        let commands = controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::End,
        });
        let reports = reports(&commands);
        assert!(reports.contains(&SessionReport::Notice {
            text: Language::Thai.phrases().didnt_hear.to_string()
        }));
        assert!(!reports
            .iter()
            .any(|report| matches!(report, SessionReport::Verdict { .. })));
    }

    #[test]
    fn test_recognition_failure_returns_to_idle_with_prompt() {
        let (mut controller, _) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let (attempt, _) = listen(&mut controller);
        let commands = controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Error(RecognitionFailure::PermissionDenied),
        });
        let reports = reports(&commands);
        assert!(reports.contains(&SessionReport::RecognitionFailed {
            failure: RecognitionFailure::PermissionDenied
        }));
        assert!(reports.contains(&SessionReport::ListeningChanged {
            state: ListenState::Idle
        }));
    }

    #[test]
    fn test_full_story_run() {
        let (mut controller, devices) = controller();
        finish_round(&mut controller);
        devices.take();

        let mut commands = controller.handle(SessionInput::Action(UserAction::BeginStory {
            tone: StoryTone::Adventure,
        }));
        let mut appended = Vec::new();
        for index in 1..=5 {
            let (token, request) = generation(&commands);
            match index {
                1 => assert!(matches!(request, GenerationRequest::Opening { .. })),
                5 => assert!(matches!(request, GenerationRequest::Closing { .. })),
                _ => assert!(matches!(
                    request,
                    GenerationRequest::Continuation { scene_index, .. } if scene_index == index
                )),
            }
            commands = controller.handle(SessionInput::Generated {
                token,
                outcome: Ok(scene(&format!("Scene {index}."))),
            });
            appended.extend(reports(&commands).into_iter().filter_map(|r| match r {
                SessionReport::SceneAppended { scene } => Some(scene),
                _ => None,
            }));
            if index < 5 {
                commands = controller.handle(SessionInput::Action(UserAction::Choose {
                    choice: "left".to_string(),
                }));
            }
        }

        let (token, request) = generation(&commands);
        assert_eq!(
            request,
            GenerationRequest::Title {
                full_story: "Scene 1.\n\nScene 2.\n\nScene 3.\n\nScene 4.\n\nScene 5.".to_string()
            }
        );
        let commands = controller.handle(SessionInput::Generated {
            token,
            outcome: Ok(Generated::Title("Left Forever".to_string())),
        });

        assert_eq!(appended.len(), 5);
        assert_eq!(
            appended.iter().map(|s| s.sequence_index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(appended[..4].iter().all(|s| s.choices.len() == 3));
        assert!(appended[4].choices.is_empty());
        assert!(reports(&commands).iter().any(|report| matches!(
            report,
            SessionReport::StoryFinished { title, scenes } if title == "Left Forever" && scenes.len() == 5
        )));

        // Every scene is narrated exactly once; the closing one after the title.
        let spoken: Vec<_> = devices
            .take()
            .into_iter()
            .filter(|entry| entry.starts_with("speak:"))
            .collect();
        assert_eq!(spoken.len(), 5);
        assert!(spoken[4].ends_with(":Scene 5."));
    }

    #[test]
    fn test_failed_generation_uses_fallback_scene() {
        let (mut controller, _) = controller();
        finish_round(&mut controller);
        let commands = controller.handle(SessionInput::Action(UserAction::BeginStory {
            tone: StoryTone::Funny,
        }));
        let (token, _) = generation(&commands);
        let commands = controller.handle(SessionInput::Generated {
            token,
            outcome: Err(GenerationFailure::Remote("timeout".to_string())),
        });
        let scene = reports(&commands)
            .into_iter()
            .find_map(|report| match report {
                SessionReport::SceneAppended { scene } => Some(scene),
                _ => None,
            })
            .unwrap();
        assert_eq!(scene.narrative_text, Language::Thai.phrases().fallback_opening);
        assert!(scene.choices.is_empty());
        assert_eq!(scene.sequence_index, 1);
    }

    #[test]
    fn test_generation_after_dispose_is_discarded() {
        let (mut controller, devices) = controller();
        finish_round(&mut controller);
        let commands = controller.handle(SessionInput::Action(UserAction::BeginStory {
            tone: StoryTone::Dreamy,
        }));
        let (token, _) = generation(&commands);
        devices.take();

        let disposed = controller.dispose();
        assert_eq!(reports(&disposed), vec![SessionReport::Disposed]);
        assert!(controller.dispose().is_empty());

        let late = controller.handle(SessionInput::Generated {
            token,
            outcome: Ok(scene("Too late.")),
        });
        assert!(late.is_empty());
        assert!(devices.take().is_empty());
    }

    #[test]
    fn test_superseded_generation_is_discarded() {
        let (mut controller, _) = controller();
        finish_round(&mut controller);
        let commands = controller.handle(SessionInput::Action(UserAction::BeginStory {
            tone: StoryTone::Mystery,
        }));
        let (stale, _) = generation(&commands);
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        assert!(reports(&controller.handle(SessionInput::Generated {
            token: stale,
            outcome: Ok(scene("Old.")),
        }))
        .is_empty());
    }

    #[test]
    fn test_go_home_aborts_listening() {
        let (mut controller, devices) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let (attempt, _) = listen(&mut controller);
        // Replay never talks over the microphone.
        controller.handle(SessionInput::Action(UserAction::Replay));
        devices.take();

        let commands = controller.handle(SessionInput::Action(UserAction::GoHome));
        assert_eq!(
            reports(&commands),
            vec![
                SessionReport::ListeningChanged {
                    state: ListenState::Idle
                },
                SessionReport::Disposed,
            ]
        );
        assert_eq!(devices.take(), vec!["abort:1"]);
        assert!(controller.is_disposed());

        // The aborted attempt's late callbacks are dropped.
        let late = controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Result(TranscriptEvent {
                text: "สุนัข".to_string(),
                is_final: true,
            }),
        });
        assert!(late.is_empty());
    }

    #[test]
    fn test_go_home_stops_speech() {
        let (mut controller, devices) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        devices.take();

        let commands = controller.handle(SessionInput::Action(UserAction::GoHome));
        assert_eq!(
            reports(&commands),
            vec![
                SessionReport::SpeakingChanged { speaking: false },
                SessionReport::Disposed,
            ]
        );
        assert_eq!(devices.take(), vec!["cancel"]);
    }

    #[test]
    fn test_speech_flag_follows_device_callbacks() {
        let (mut controller, _) = controller();
        let commands = controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        assert!(reports(&commands).contains(&SessionReport::SpeakingChanged { speaking: true }));

        let stale = controller.handle(SessionInput::Speech {
            utterance: UtteranceId(99),
            event: SynthesisEvent::Ended,
        });
        assert!(stale.is_empty());

        let ended = controller.handle(SessionInput::Speech {
            utterance: UtteranceId(1),
            event: SynthesisEvent::Ended,
        });
        assert_eq!(
            reports(&ended),
            vec![SessionReport::SpeakingChanged { speaking: false }]
        );
    }

    #[test]
    fn test_speech_failure_clears_speaking_flag() {
        let (mut controller, _) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        assert!(controller
            .handle(SessionInput::Speech {
                utterance: UtteranceId(1),
                event: SynthesisEvent::Started,
            })
            .is_empty());

        let failed = controller.handle(SessionInput::Speech {
            utterance: UtteranceId(1),
            event: SynthesisEvent::Failed("audio-busy".to_string()),
        });
        assert_eq!(
            reports(&failed),
            vec![SessionReport::SpeakingChanged { speaking: false }]
        );
    }

    #[test]
    fn test_choice_preview_is_silent_while_listening() {
        let (mut controller, devices) = controller();
        finish_round(&mut controller);
        let commands = controller.handle(SessionInput::Action(UserAction::BeginStory {
            tone: StoryTone::Adventure,
        }));
        let (token, _) = generation(&commands);
        controller.handle(SessionInput::Generated {
            token,
            outcome: Ok(scene("Scene 1.")),
        });
        devices.take();

        controller.handle(SessionInput::Action(UserAction::PreviewChoice { index: 0 }));
        let spoken = devices.take();
        assert!(spoken.last().unwrap().ends_with(":left"));

        listen(&mut controller);
        devices.take();
        controller.handle(SessionInput::Action(UserAction::PreviewChoice { index: 0 }));
        assert!(devices
            .take()
            .iter()
            .all(|entry| !entry.starts_with("speak:")));
    }

    #[test]
    fn test_listen_while_finalizing_keeps_retry_prompt() {
        let (mut controller, devices) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let (attempt, _) = listen(&mut controller);
        controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Result(TranscriptEvent {
                text: "banana".to_string(),
                is_final: true,
            }),
        });
        assert!(devices
            .take()
            .last()
            .unwrap()
            .ends_with(Language::Thai.phrases().retry));

        // The engine has not ended the attempt yet.
        assert!(controller
            .handle(SessionInput::Action(UserAction::Listen))
            .is_empty());
        assert!(devices.take().is_empty());
    }

    #[test]
    fn test_engine_error_after_evaluation_is_not_reported() {
        let (mut controller, devices) = controller();
        controller.handle(SessionInput::StartDrill {
            items: round(),
            pool: Vec::new(),
        });
        let (attempt, _) = listen(&mut controller);
        controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Result(TranscriptEvent {
                text: "สุนัข".to_string(),
                is_final: true,
            }),
        });
        devices.take();

        let commands = controller.handle(SessionInput::Recognition {
            attempt,
            event: RecognitionEvent::Error(RecognitionFailure::Engine("network".to_string())),
        });
        assert_eq!(
            reports(&commands),
            vec![SessionReport::ListeningChanged {
                state: ListenState::Idle
            }]
        );
        assert!(devices.take().is_empty());
    }
}
