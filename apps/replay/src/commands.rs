use std::str::FromStr;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::session::AppSession;

pub const HELP: &str = "\
commands:
  play | pause | reset
  seek <index>          jump to a point
  seek-time <rfc3339>   jump to the last point at or before a time
  speed <slider>        slider value, higher is faster (only while paused)
  view                  recentre the map
  status | summary | incidents
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Reset,
    Seek(usize),
    SeekTime(OffsetDateTime),
    Speed(u64),
    View,
    Status,
    Summary,
    Incidents,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArg(&'static str),
    #[error("`{cmd}`: can't read {value:?}")]
    BadArg { cmd: &'static str, value: String },
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(ParseError::Empty);
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "reset" => Command::Reset,
            "seek" => Command::Seek(arg(words.next(), "seek", |s| s.parse().ok())?),
            "seek-time" => Command::SeekTime(arg(words.next(), "seek-time", |s| {
                OffsetDateTime::parse(s, &Rfc3339).ok()
            })?),
            "speed" => Command::Speed(arg(words.next(), "speed", |s| s.parse().ok())?),
            "view" => Command::View,
            "status" => Command::Status,
            "summary" => Command::Summary,
            "incidents" => Command::Incidents,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

fn arg<T>(
    word: Option<&str>,
    cmd: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, ParseError> {
    let word = word.ok_or(ParseError::MissingArg(cmd))?;
    parse(word).ok_or_else(|| ParseError::BadArg { cmd, value: word.to_string() })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

pub fn run(session: &AppSession, cmd: Command) -> Reply {
    let clock = &session.clock;
    match cmd {
        Command::Play => clock.play(),
        Command::Pause => clock.pause(),
        Command::Reset => clock.reset(),
        Command::Seek(i) => {
            if i >= clock.total_points() {
                return Reply::Text(format!("no point {}; trip has {}", i, clock.total_points()));
            }
            clock.seek(i);
        }
        Command::SeekTime(t) => clock.seek_to_time(t),
        Command::Speed(v) => {
            if !session.set_speed(v) {
                return Reply::Text("speed is locked while playing; pause first".into());
            }
        }
        Command::View => session.renderer.reset_view(),
        Command::Status => {}
        Command::Summary => {
            let s = session.summary();
            let duration = s.duration_s.map(|d| format!("{}s", d)).unwrap_or_else(|| "-".into());
            return Reply::Text(format!(
                "{}: {} points, {} incidents, {:.0} m, {}",
                session.trip.name, s.points, s.incidents, s.distance_m, duration
            ));
        }
        Command::Incidents => return Reply::Text(incidents(session)),
        Command::Help => return Reply::Text(HELP.into()),
        Command::Quit => return Reply::Quit,
    }
    Reply::Text(status(session))
}

pub fn status(session: &AppSession) -> String {
    let snap = session.clock.snapshot();
    let speed = session.speed.lock();
    if snap.total_points == 0 {
        return "no route points recorded for this trip".into();
    }
    let at = snap
        .current_point
        .as_ref()
        .and_then(|p| p.captured_at.format(&Rfc3339).ok())
        .unwrap_or_default();
    format!(
        "{} {}/{} {:.1}% {} | {} ({} ms)",
        if snap.is_playing { "playing" } else { "paused" },
        snap.cursor_index,
        snap.total_points - 1,
        snap.progress_percent,
        at,
        speed.band(),
        snap.interval_ms,
    )
}

fn incidents(session: &AppSession) -> String {
    if session.trip.incidents.is_empty() {
        return "no incidents".into();
    }
    let mut list: Vec<_> = session.trip.incidents.iter().collect();
    list.sort_by_key(|i| i.timestamp);
    list.iter()
        .map(|i| {
            let when = i.timestamp.format(&Rfc3339).unwrap_or_default();
            let place = match i.coordinates {
                Some(c) => format!("{:.5},{:.5}", c.latitude, c.longitude),
                None => "no location".into(),
            };
            let mut line = format!("{} {} ({})", when, i.name, place);
            if let Some(n) = &i.notes {
                line.push_str(&format!(" - {}", n));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
