//! Interactive console front-end.
//!
//! The presentation layer is deliberately thin: a line-based command parser
//! feeding the bus, and a printer that renders catalog listings and score
//! reports as they arrive. All real behavior lives behind the bus.

use log::{debug, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::protocol::{LibraryMessage, Message, ScoringMessage};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Genres,
    Artists {
        genre: String,
    },
    Songs {
        genre: String,
        artist: String,
    },
    Play {
        genre: String,
        artist: String,
        song_name: String,
    },
    /// Bare `play` after a pause.
    Resume,
    Pause,
    Stop,
    Rescan,
    Help,
    Quit,
}

pub fn help_text() -> &'static str {
    "Commands:\n  \
     genres                         list genres\n  \
     artists <genre>                list artists in a genre\n  \
     songs <genre> / <artist>       list songs of an artist\n  \
     play <genre> / <artist> / <song>   play a song\n  \
     play                           resume after pause\n  \
     pause                          pause playback (reports the score)\n  \
     stop                           stop playback (reports the score)\n  \
     rescan                         rebuild the library catalog\n  \
     help                           show this help\n  \
     quit                           exit"
}

/// Splits a `a / b / c` argument tail into trimmed, non-empty segments.
fn path_segments(rest: &str) -> Vec<String> {
    rest.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses one input line. Returns `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };

    let command = match keyword.to_ascii_lowercase().as_str() {
        "genres" => ConsoleCommand::Genres,
        "artists" => {
            if rest.is_empty() {
                return Err("usage: artists <genre>".to_string());
            }
            ConsoleCommand::Artists {
                genre: rest.to_string(),
            }
        }
        "songs" => {
            let segments = path_segments(rest);
            match <[String; 2]>::try_from(segments) {
                Ok([genre, artist]) => ConsoleCommand::Songs { genre, artist },
                Err(_) => return Err("usage: songs <genre> / <artist>".to_string()),
            }
        }
        "play" => {
            if rest.is_empty() {
                ConsoleCommand::Resume
            } else {
                let segments = path_segments(rest);
                match <[String; 3]>::try_from(segments) {
                    Ok([genre, artist, song_name]) => ConsoleCommand::Play {
                        genre,
                        artist,
                        song_name,
                    },
                    Err(_) => {
                        return Err("usage: play <genre> / <artist> / <song>".to_string())
                    }
                }
            }
        }
        "resume" => ConsoleCommand::Resume,
        "pause" => ConsoleCommand::Pause,
        "stop" => ConsoleCommand::Stop,
        "rescan" => ConsoleCommand::Rescan,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

fn print_listing(title: &str, entries: &[String]) {
    println!("{}:", title);
    if entries.is_empty() {
        println!("  (none)");
        return;
    }
    for entry in entries {
        println!("  {}", entry);
    }
}

/// Renders bus notifications to stdout.
pub struct ConsoleManager {
    bus_consumer: Receiver<Message>,
}

impl ConsoleManager {
    pub fn new(bus_consumer: Receiver<Message>) -> Self {
        Self { bus_consumer }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Library(LibraryMessage::Genres(genres)) => {
                print_listing("Genres", &genres);
            }
            Message::Library(LibraryMessage::Artists { genre, artists }) => {
                print_listing(&format!("Artists in {}", genre), &artists);
            }
            Message::Library(LibraryMessage::Songs {
                genre,
                artist,
                songs,
            }) => {
                print_listing(&format!("Songs by {} ({})", artist, genre), &songs);
            }
            Message::Library(LibraryMessage::SongNotFound {
                genre,
                artist,
                song_name,
            }) => {
                println!("Not in the library: {} / {} / {}", genre, artist, song_name);
            }
            Message::Library(LibraryMessage::ScanCompleted { item_count }) => {
                println!("Library ready: {} song(s)", item_count);
            }
            Message::Scoring(ScoringMessage::SessionFinished(card)) => {
                println!();
                println!("Participation: {}%", card.percent);
                println!("Rating: {}", card.rating);
            }
            Message::Scoring(ScoringMessage::CaptureUnavailable(reason)) => {
                println!("Warning: {}. This round will score as silence.", reason);
            }
            _ => {} // Ignore other messages
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("ConsoleManager: bus lagged, {} message(s) skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("ConsoleManager: bus closed, exiting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ConsoleCommand};

    #[test]
    fn test_bare_keywords_parse_to_their_commands() {
        assert_eq!(
            parse_command("genres").unwrap(),
            Some(ConsoleCommand::Genres)
        );
        assert_eq!(parse_command("pause").unwrap(), Some(ConsoleCommand::Pause));
        assert_eq!(parse_command("stop").unwrap(), Some(ConsoleCommand::Stop));
        assert_eq!(
            parse_command("rescan").unwrap(),
            Some(ConsoleCommand::Rescan)
        );
        assert_eq!(parse_command("help").unwrap(), Some(ConsoleCommand::Help));
        assert_eq!(parse_command("quit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("exit").unwrap(), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_blank_lines_parse_to_nothing() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            parse_command("GENRES").unwrap(),
            Some(ConsoleCommand::Genres)
        );
        assert_eq!(parse_command("Play").unwrap(), Some(ConsoleCommand::Resume));
    }

    #[test]
    fn test_artists_takes_the_whole_tail_as_the_genre() {
        assert_eq!(
            parse_command("artists Classic Rock").unwrap(),
            Some(ConsoleCommand::Artists {
                genre: "Classic Rock".to_string()
            })
        );
        assert!(parse_command("artists").is_err());
    }

    #[test]
    fn test_songs_splits_genre_and_artist_on_the_slash() {
        assert_eq!(
            parse_command("songs Rock / Queen").unwrap(),
            Some(ConsoleCommand::Songs {
                genre: "Rock".to_string(),
                artist: "Queen".to_string()
            })
        );
        assert!(parse_command("songs Rock").is_err());
        assert!(parse_command("songs Rock / Queen / extra").is_err());
    }

    #[test]
    fn test_play_accepts_full_coordinates_with_spaces_in_names() {
        assert_eq!(
            parse_command("play Rock / Queen / Bohemian Rhapsody").unwrap(),
            Some(ConsoleCommand::Play {
                genre: "Rock".to_string(),
                artist: "Queen".to_string(),
                song_name: "Bohemian Rhapsody".to_string()
            })
        );
    }

    #[test]
    fn test_bare_play_means_resume() {
        assert_eq!(parse_command("play").unwrap(), Some(ConsoleCommand::Resume));
        assert_eq!(
            parse_command("resume").unwrap(),
            Some(ConsoleCommand::Resume)
        );
    }

    #[test]
    fn test_unknown_commands_are_rejected_with_a_hint() {
        let err = parse_command("dance").unwrap_err();
        assert!(err.contains("dance"));
        assert!(err.contains("help"));
    }
}
