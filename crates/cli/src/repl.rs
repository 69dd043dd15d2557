//! Interactive practice loop reading commands from stdin.

use crate::clock::{ClockPlayer, TICK};
use crate::pcm::PcmDecoder;
use anyhow::{anyhow, Result};
use lingua_core::boundary::Handle;
use lingua_core::waveform::{
    spawn_decode, AudioResource, Frame, ResourceId, Surface, WaveformRenderer,
};
use lingua_core::{Key, Player, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Key(Key),
    Go(u32),
    Star(Option<u32>),
    Filter(bool),
    Edit(String),
    Timing,
    Nudge(Handle, f64),
    Drag(Handle, f64),
    SaveTiming,
    CancelTiming,
    List,
    Wave,
    ExportSrt,
    ExportText,
    Status,
    Help,
    Quit,
}

/// Parse a command line. Returns `None` for blank input.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let handle = |s: &str| match s {
        "start" | "s" => Ok(Handle::Start),
        "end" | "e" => Ok(Handle::End),
        other => Err(anyhow!("unknown handle `{other}`")),
    };
    let cmd = match word {
        "" => return Ok(None),
        "play" | "pause" | "space" => Command::Key(Key::Space),
        "next" | "n" => Command::Key(Key::Right),
        "prev" | "p" => Command::Key(Key::Left),
        "down" | "j" => Command::Key(Key::Down),
        "up" | "k" => Command::Key(Key::Up),
        "replay" | "r" => Command::Key(Key::Enter),
        "go" => Command::Go(rest.parse()?),
        "star" => Command::Star(if rest.is_empty() { None } else { Some(rest.parse()?) }),
        "filter" => match rest {
            "on" => Command::Filter(true),
            "off" => Command::Filter(false),
            other => return Err(anyhow!("filter expects on|off, got `{other}`")),
        },
        "edit" => Command::Edit(rest.to_string()),
        "timing" => Command::Timing,
        "nudge" | "drag" => {
            let (h, v) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: {word} start|end <value>"))?;
            let h = handle(h)?;
            let v: f64 = v.trim().parse()?;
            if word == "nudge" {
                Command::Nudge(h, v)
            } else {
                Command::Drag(h, v)
            }
        }
        "save" => Command::SaveTiming,
        "cancel" => Command::CancelTiming,
        "list" | "ls" => Command::List,
        "wave" => Command::Wave,
        "export" => match rest {
            "srt" | "" => Command::ExportSrt,
            "txt" | "text" => Command::ExportText,
            other => return Err(anyhow!("unknown export format `{other}`")),
        },
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(anyhow!("unknown command `{other}`, try `help`")),
    };
    Ok(Some(cmd))
}

const HELP: &str = "\
play | next | prev | up | down | replay   transport
go <id>                                   play a sentence
star [id] | filter on|off                 starred sentences
edit <text>                               replace the current sentence text
timing, nudge|drag start|end <v>, save|cancel   adjust timing
list | wave | status | export srt|txt | quit";

/// Terminal width, measured again on every redraw.
struct TerminalSurface {
    fallback: usize,
}

impl Surface for TerminalSurface {
    fn width(&self) -> usize {
        columns(crossterm::terminal::size(), self.fallback)
    }
}

/// Column count from a terminal size query, or `fallback` when stdout is
/// not a terminal.
fn columns(size: std::io::Result<(u16, u16)>, fallback: usize) -> usize {
    match size {
        Ok((cols, _)) if cols > 0 => usize::from(cols),
        Ok(_) => fallback,
        Err(err) => {
            trace!("terminal size unavailable: {err}");
            fallback
        }
    }
}

/// Advance the clock to `now` and forward the result to the session.
fn apply_tick(session: &mut Session<ClockPlayer>, now: Instant) {
    let Some(tick) = session.navigator_mut().player_mut().tick(now) else {
        return;
    };
    let progress = session.on_time_update(tick.time);
    debug!("t={:.3} progress={progress:.0}%", tick.time);
    if tick.ended {
        info!("reached end of media");
        session.on_pause();
    }
}

/// Raw PCM file feeding the waveform.
pub struct AudioInput {
    pub path: PathBuf,
    pub sample_rate: u32,
}

pub struct Repl {
    session: Session<ClockPlayer>,
    renderer: WaveformRenderer,
    surface: TerminalSurface,
    frame: Option<Frame>,
}

impl Repl {
    pub fn new(session: Session<ClockPlayer>, width: usize) -> Self {
        Self {
            session,
            renderer: WaveformRenderer::new(),
            surface: TerminalSurface { fallback: width },
            frame: None,
        }
    }

    /// Run until stdin closes or `quit`.
    pub async fn run(mut self, audio: Option<AudioInput>) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(1);
        if let Some(input) = audio {
            let bytes = tokio::fs::read(&input.path).await?;
            let decoder = PcmDecoder {
                sample_rate: input.sample_rate,
            };
            self.session
                .navigator_mut()
                .player_mut()
                .set_duration(decoder.duration_of(bytes.len()));
            let id = ResourceId(1);
            self.renderer.begin(id);
            info!("decoding {} in the background", input.path.display());
            spawn_decode(
                Arc::new(decoder),
                AudioResource {
                    id,
                    bytes: bytes.into(),
                },
                tx.clone(),
            );
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(TICK);
        self.print_current();
        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),
                Some((id, res)) = rx.recv() => {
                    if self.renderer.accept(id, res) {
                        self.refresh_frame();
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_command(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(cmd)) => {
                            if let Err(err) = self.execute(cmd).await {
                                println!("error: {err}");
                            }
                        }
                        Ok(None) => {}
                        Err(err) => println!("error: {err}"),
                    }
                }
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        apply_tick(&mut self.session, Instant::now());
    }

    async fn execute(&mut self, cmd: Command) -> Result<()> {
        let before = self.session.selected();
        match cmd {
            Command::Key(key) => self.session.handle_key(key).await?,
            Command::Go(id) => {
                if self.session.is_editing_timing() {
                    return Err(anyhow!("finish the timing edit first with `save` or `cancel`"));
                }
                self.session.select_and_play(id).await?
            }
            Command::Star(id) => {
                let id = id
                    .or(self.session.selected())
                    .ok_or_else(|| anyhow!("nothing selected"))?;
                let starred = self.session.toggle_star(id)?;
                println!("sentence {id} {}", if starred { "starred" } else { "unstarred" });
            }
            Command::Filter(on) => self.session.set_filter(on),
            Command::Edit(text) => {
                let id = self
                    .session
                    .selected()
                    .ok_or_else(|| anyhow!("nothing selected"))?;
                self.session.begin_text_edit(id)?;
                self.session.update_text_draft(text);
                if let Err(err) = self.session.commit_text_edit() {
                    self.session.cancel_text_edit();
                    return Err(err.into());
                }
                println!("sentence saved");
            }
            Command::Timing => {
                self.session.begin_boundary_edit()?;
                self.print_timing();
            }
            Command::Nudge(handle, delta) => {
                self.session
                    .nudge_boundary(handle, delta)
                    .ok_or_else(|| anyhow!("not editing timing, use `timing` first"))?;
                self.print_timing();
            }
            Command::Drag(handle, fraction) => {
                self.session
                    .drag_boundary(handle, fraction)
                    .ok_or_else(|| anyhow!("not editing timing, use `timing` first"))?;
                self.print_timing();
            }
            Command::SaveTiming => match self.session.commit_boundary_edit()? {
                Some(commit) => println!(
                    "timestamps saved: {:.3} --> {:.3}",
                    commit.start_time, commit.end_time
                ),
                None => println!("not editing timing"),
            },
            Command::CancelTiming => self.session.cancel_boundary_edit(),
            Command::List => self.print_list(),
            Command::Wave => self.print_wave(),
            Command::ExportSrt => print!("{}", self.session.export_srt()),
            Command::ExportText => println!("{}", self.session.export_text()),
            Command::Status => self.print_status(),
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        if self.session.selected() != before {
            self.print_current();
        }
        self.refresh_frame();
        Ok(())
    }

    fn refresh_frame(&mut self) {
        let Some(scene) = self.session.scene() else {
            return;
        };
        if let Some(frame) = self.renderer.redraw(&self.surface, &scene) {
            self.frame = Some(frame);
        }
    }

    fn print_current(&self) {
        if let Some(segment) = self.session.store().current() {
            let star = if segment.starred { "*" } else { " " };
            println!("{star} [{}] {}", segment.id, segment.text);
        }
    }

    fn print_status(&self) {
        if let Some(status) = self.session.status() {
            println!(
                "{status} | {:?} | {:.0}% | filter {}",
                self.session.state(),
                self.session.progress(),
                if self.session.store().filter_on() { "on" } else { "off" }
            );
        }
    }

    fn print_list(&self) {
        let selected = self.session.selected();
        for segment in self.session.store().active_view().iter() {
            let cursor = if Some(segment.id) == selected { ">" } else { " " };
            let star = if segment.starred { "*" } else { " " };
            println!("{cursor}{star} {:>4}. {}", segment.id, segment.text);
        }
    }

    fn print_timing(&self) {
        if let Some(editor) = self.session.boundary_editor() {
            let (start, end) = editor.bounds();
            println!(
                "editing {}: {} --> {}",
                editor.segment_id(),
                lingua_core::srt::timecode::format(start),
                lingua_core::srt::timecode::format(end)
            );
        }
    }

    fn print_wave(&self) {
        match &self.frame {
            Some(frame) => {
                let time = self.session.navigator().player().current_time();
                println!("{}", frame.to_ascii(8, frame.cursor_x(time)));
            }
            None if self.renderer.has_samples() => println!("nothing to draw"),
            None => warn!("waveform not available yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::{PlaybackState, PracticeConfig};
    use std::time::Duration;

    #[test]
    fn parses_transport_and_edit_commands() {
        assert_eq!(parse_command("  ").unwrap(), None);
        assert_eq!(parse_command("next").unwrap(), Some(Command::Key(Key::Right)));
        assert_eq!(parse_command("go 12").unwrap(), Some(Command::Go(12)));
        assert_eq!(parse_command("star").unwrap(), Some(Command::Star(None)));
        assert_eq!(parse_command("filter on").unwrap(), Some(Command::Filter(true)));
        assert_eq!(
            parse_command("edit  Hello   there ").unwrap(),
            Some(Command::Edit("Hello   there".into()))
        );
        assert_eq!(
            parse_command("nudge end -0.25").unwrap(),
            Some(Command::Nudge(Handle::End, -0.25))
        );
        assert_eq!(
            parse_command("drag s 0.5").unwrap(),
            Some(Command::Drag(Handle::Start, 0.5))
        );
    }

    #[test]
    fn width_falls_back_without_a_terminal() {
        assert_eq!(columns(Ok((132, 40)), 80), 132);
        assert_eq!(columns(Ok((0, 0)), 80), 80);
        let err = std::io::Error::new(std::io::ErrorKind::Other, "not a tty");
        assert_eq!(columns(Err(err), 80), 80);
    }

    const DOC: &str = "1\n00:00:00,000 --> 00:00:03,000\nA\n\n\
                       2\n00:00:04,000 --> 00:00:07,000\nB\n\n";

    fn loaded(duration: Option<f64>) -> Session<ClockPlayer> {
        let mut session = Session::new(ClockPlayer::new(duration), PracticeConfig::default());
        session.load(DOC).unwrap();
        session
    }

    #[tokio::test]
    async fn end_of_media_pauses_the_session() {
        let mut session = loaded(Some(1.0));
        session.select_and_play(1).await.unwrap();
        assert_eq!(session.state(), PlaybackState::Playing);
        apply_tick(&mut session, Instant::now() + Duration::from_secs(2));
        assert!(session.navigator().player().is_paused());
        assert_eq!(session.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn go_is_refused_during_timing_edit() {
        let mut repl = Repl::new(loaded(None), 40);
        repl.execute(Command::Timing).await.unwrap();
        assert!(repl.execute(Command::Go(2)).await.is_err());
        assert_eq!(repl.session.selected(), Some(1));
        assert!(repl.session.navigator().player().is_paused());
        repl.execute(Command::CancelTiming).await.unwrap();
        repl.execute(Command::Go(2)).await.unwrap();
        assert_eq!(repl.session.selected(), Some(2));
        assert_eq!(repl.session.state(), PlaybackState::Playing);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse_command("fly").is_err());
        assert!(parse_command("filter maybe").is_err());
        assert!(parse_command("nudge middle 1").is_err());
        assert!(parse_command("go x").is_err());
    }
}
