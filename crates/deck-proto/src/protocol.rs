//! Line protocol spoken with the playback backend over its stdin/stdout.
//!
//! Outbound (to backend): `<opcode>[ <arg>]\n`, one command per line.
//! Opcodes: 1 play, 2 pause, 3 next, 4 prev, 5 shuffle, 6 repeat, 8 reload,
//! 9 exit, 10 list library, 11 `<id>` play by id, 12 `<id>` delete.
//! Non-numeric text is taken by the backend as a search query.
//!
//! Inbound (from backend): free-form log text.  A few tagged, pipe-delimited
//! lines carry structure:
//!
//! ```text
//!   NOW_PLAYING|<index>|<filename>|<title>   track change
//!   LIB|<id>|<title>                         library listing row
//!   MATCH|<id>|<title>                       search result row
//!   ERROR: ...                               backend-reported failure
//! ```
use crate::error::BridgeError;

/// Opcodes the bridge itself issues.  Everything else arrives as
/// control-surface text and is passed through by number.
pub mod opcode {
    pub const RELOAD: u32 = 8;
    pub const DELETE: u32 = 12;
}

/// The backend reads stdin with a 256-byte line buffer; anything longer would
/// be split into two commands on its side.
pub const MAX_COMMAND_LEN: usize = 255;

pub const NOW_PLAYING_TAG: &str = "NOW_PLAYING";
pub const LIBRARY_TAG: &str = "LIB";
pub const SEARCH_MATCH_TAG: &str = "MATCH";
pub const ERROR_PREFIX: &str = "ERROR:";
pub const FIELD_DELIMITER: char = '|';

// ── outbound ──────────────────────────────────────────────────────────────────

/// A command for the backend, before rendering to its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generic opcode with an optional argument, e.g. `3` or `11 5`.
    Opcode { code: u32, arg: Option<String> },
    /// Re-read the song list from disk.
    Reload,
    /// Forget a track by its backend id.
    Delete { id: u32 },
    /// Free-text library search.
    Search(String),
}

impl Command {
    pub fn op(code: u32) -> Self {
        Command::Opcode { code, arg: None }
    }

    /// Parse free-form control-surface input (`"3"`, `"11 5"`, `"jazz"`).
    ///
    /// A leading integer is an opcode and the remainder its argument; any
    /// other text is a search query.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        check_single_line(text)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(BridgeError::InvalidCommand(text.to_string()));
        }

        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };

        let code = match head.parse::<u32>() {
            Ok(code) => code,
            Err(_) => return Ok(Command::Search(text.to_string())),
        };

        let cmd = match (code, rest) {
            (opcode::RELOAD, "") => Command::Reload,
            (code, "") => Command::op(code),
            (opcode::DELETE, arg) => match arg.parse() {
                Ok(id) => Command::Delete { id },
                Err(_) => Command::Opcode {
                    code: opcode::DELETE,
                    arg: Some(arg.to_string()),
                },
            },
            (code, arg) => Command::Opcode {
                code,
                arg: Some(arg.to_string()),
            },
        };
        Ok(cmd)
    }

    /// Render to the exact line written to the backend, newline included.
    pub fn to_wire(&self) -> Result<String, BridgeError> {
        let mut line = match self {
            Command::Opcode { code, arg: None } => code.to_string(),
            Command::Opcode {
                code,
                arg: Some(arg),
            } => {
                check_single_line(arg)?;
                let arg = arg.trim();
                if arg.is_empty() {
                    code.to_string()
                } else {
                    format!("{} {}", code, arg)
                }
            }
            Command::Reload => opcode::RELOAD.to_string(),
            Command::Delete { id } => format!("{} {}", opcode::DELETE, id),
            Command::Search(query) => {
                check_single_line(query)?;
                let query = query.trim();
                if query.is_empty() {
                    return Err(BridgeError::InvalidCommand(query.to_string()));
                }
                query.to_string()
            }
        };

        if line.len() > MAX_COMMAND_LEN - 1 {
            return Err(BridgeError::InvalidCommand(line));
        }
        line.push('\n');
        Ok(line)
    }
}

fn check_single_line(text: &str) -> Result<(), BridgeError> {
    if text.contains(['\n', '\r']) {
        return Err(BridgeError::InvalidCommand(text.to_string()));
    }
    Ok(())
}

// ── inbound ───────────────────────────────────────────────────────────────────

/// One backend output line after decoding.  Every variant keeps the trimmed
/// raw line so it can still be shown as a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Log(String),
    NowPlaying {
        line: String,
        index: Option<u32>,
        filename: String,
        title: Option<String>,
    },
    LibraryEntry {
        line: String,
        id: u32,
        title: String,
    },
    SearchMatch {
        line: String,
        id: u32,
        title: String,
    },
    Error(String),
}

impl DecodedEvent {
    pub fn line(&self) -> &str {
        match self {
            DecodedEvent::Log(line) | DecodedEvent::Error(line) => line,
            DecodedEvent::NowPlaying { line, .. }
            | DecodedEvent::LibraryEntry { line, .. }
            | DecodedEvent::SearchMatch { line, .. } => line,
        }
    }

    pub fn into_line(self) -> String {
        match self {
            DecodedEvent::Log(line) | DecodedEvent::Error(line) => line,
            DecodedEvent::NowPlaying { line, .. }
            | DecodedEvent::LibraryEntry { line, .. }
            | DecodedEvent::SearchMatch { line, .. } => line,
        }
    }
}

/// Decode one raw output line.  Returns `None` for blank lines, which are
/// never enqueued.  Never fails: anything unrecognised is a plain log line.
///
/// The tag is the first token delimited by whitespace or `|`, and must equal
/// a known tag exactly; fields are then the `|`-separated parts of the line.
pub fn decode(raw: &str) -> Option<DecodedEvent> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let tag = line
        .split(|c: char| c == FIELD_DELIMITER || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();

    let event = match (tag, fields.as_slice()) {
        (NOW_PLAYING_TAG, [_, index, filename, rest @ ..]) => DecodedEvent::NowPlaying {
            line: line.to_string(),
            index: index.trim().parse().ok(),
            filename: filename.to_string(),
            title: (!rest.is_empty()).then(|| rest.join("|")),
        },
        (LIBRARY_TAG, [_, id, title @ ..]) if !title.is_empty() => match id.trim().parse() {
            Ok(id) => DecodedEvent::LibraryEntry {
                line: line.to_string(),
                id,
                title: title.join("|"),
            },
            Err(_) => DecodedEvent::Log(line.to_string()),
        },
        (SEARCH_MATCH_TAG, [_, id, title @ ..]) if !title.is_empty() => match id.trim().parse() {
            Ok(id) => DecodedEvent::SearchMatch {
                line: line.to_string(),
                id,
                title: title.join("|"),
            },
            Err(_) => DecodedEvent::Log(line.to_string()),
        },
        _ if line.starts_with(ERROR_PREFIX) => DecodedEvent::Error(line.to_string()),
        _ => DecodedEvent::Log(line.to_string()),
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_playing_extracts_filename() {
        match decode("NOW_PLAYING|2|track7.mp3").unwrap() {
            DecodedEvent::NowPlaying {
                index,
                filename,
                title,
                ..
            } => {
                assert_eq!(index, Some(2));
                assert_eq!(filename, "track7.mp3");
                assert_eq!(title, None);
            }
            other => panic!("Wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_now_playing_with_title() {
        let event = decode("NOW_PLAYING|0|a b.mp3|A B\n").unwrap();
        assert_eq!(
            event,
            DecodedEvent::NowPlaying {
                line: "NOW_PLAYING|0|a b.mp3|A B".to_string(),
                index: Some(0),
                filename: "a b.mp3".to_string(),
                title: Some("A B".to_string()),
            }
        );
    }

    #[test]
    fn test_short_now_playing_is_plain_log() {
        assert_eq!(
            decode("NOW_PLAYING|2"),
            Some(DecodedEvent::Log("NOW_PLAYING|2".to_string()))
        );
        // Tag must match the whole first token.
        assert!(matches!(
            decode("NOW_PLAYINGX|1|x.mp3"),
            Some(DecodedEvent::Log(_))
        ));
        assert!(matches!(
            decode("NOW_PLAYING: starting"),
            Some(DecodedEvent::Log(_))
        ));
    }

    #[test]
    fn test_now_playing_tag_followed_by_whitespace() {
        match decode("NOW_PLAYING |1|a.mp3").unwrap() {
            DecodedEvent::NowPlaying {
                index, filename, ..
            } => {
                assert_eq!(index, Some(1));
                assert_eq!(filename, "a.mp3");
            }
            other => panic!("Wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_dropped() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("   \r\n"), None);
    }

    #[test]
    fn test_tagged_rows() {
        assert!(matches!(
            decode("LIB|4|Blue in Green"),
            Some(DecodedEvent::LibraryEntry { id: 4, ref title, .. }) if title == "Blue in Green"
        ));
        assert!(matches!(
            decode("MATCH|7|So What"),
            Some(DecodedEvent::SearchMatch { id: 7, .. })
        ));
        assert!(matches!(decode("LIB|x|bad id"), Some(DecodedEvent::Log(_))));
        assert!(matches!(
            decode("ERROR: Song ID 9 not found."),
            Some(DecodedEvent::Error(_))
        ));
        assert_eq!(decode("  SYSTEM: Ready.  ").unwrap().line(), "SYSTEM: Ready.");
    }

    #[test]
    fn test_delete_wire_format() {
        assert_eq!(Command::Delete { id: 5 }.to_wire().unwrap(), "12 5\n");
        assert_eq!(Command::Reload.to_wire().unwrap(), "8\n");
        assert_eq!(
            Command::Opcode {
                code: 11,
                arg: Some("3".to_string())
            }
            .to_wire()
            .unwrap(),
            "11 3\n"
        );
        assert_eq!(Command::op(3).to_wire().unwrap(), "3\n");
    }

    #[test]
    fn test_parse_control_input() {
        assert_eq!(Command::parse("1").unwrap(), Command::op(1));
        assert_eq!(Command::parse(" 8 ").unwrap(), Command::Reload);
        assert_eq!(Command::parse("12 5").unwrap(), Command::Delete { id: 5 });
        assert_eq!(
            Command::parse("11  5").unwrap(),
            Command::Opcode {
                code: 11,
                arg: Some("5".to_string())
            }
        );
        assert_eq!(
            Command::parse("miles davis").unwrap(),
            Command::Search("miles davis".to_string())
        );
        assert_eq!(Command::parse("11 5").unwrap().to_wire().unwrap(), "11 5\n");
    }

    #[test]
    fn test_rejects_multiline_and_oversized() {
        assert!(matches!(
            Command::parse("1\n9"),
            Err(BridgeError::InvalidCommand(_))
        ));
        assert!(Command::parse("   ").is_err());
        let arg = Command::Opcode {
            code: 11,
            arg: Some("5\r\n9".to_string()),
        };
        assert!(arg.to_wire().is_err());
        assert!(Command::Search("x".repeat(MAX_COMMAND_LEN)).to_wire().is_err());
    }
}
