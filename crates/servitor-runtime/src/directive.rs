//! Parser for `.act` scripts
//!
//! One directive per line. Blank lines and lines starting with `#` are
//! skipped. Words of the form `$name` are replaced with the actor's variables
//! when the directive runs.

use servitor_engine::{CompileError, Tag};

/// Variables a script may reference.
pub const VARIABLES: &[&str] = &[
    "url", "host", "port", "pattern", "data", "fd", "sent", "tag", "delay",
];

/// A word that is either literal text or a variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    /// Literal text, escapes already resolved
    Text(String),
    /// `$name`
    Var(&'static str),
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `print <words…>`
    Print(Vec<Word>),
    /// `wait <ms> [tag]`
    Wait {
        /// Delay in milliseconds
        ms: u64,
        /// Correlation tag
        tag: Option<Tag>,
    },
    /// `connect <host> <port>`
    Connect {
        /// Host name or address
        host: Word,
        /// Port number
        port: Word,
    },
    /// `write <words…>`
    Write(Vec<Word>),
    /// `read <max> [tag]`
    Read {
        /// Upper bound of bytes read
        max: usize,
        /// Correlation tag
        tag: Option<Tag>,
    },
    /// `close`
    Close,
    /// `spawn <script> <tag>`
    Spawn {
        /// Script of the child
        script: String,
        /// Tag the child is recorded under
        tag: Tag,
    },
    /// `cast <tag> <pattern> <words…>`
    Cast {
        /// Child to cast to
        tag: Tag,
        /// Message pattern
        pattern: Word,
        /// Message body
        data: Vec<Word>,
    },
    /// `receive [pattern]`
    Receive(Option<String>),
    /// `exit`
    Exit,
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActScript {
    /// Script identifier
    pub name: String,
    /// Directives with their 1-based source line
    pub directives: Vec<(usize, Directive)>,
}

/// Parse script source.
pub fn parse(name: &str, source: &str) -> Result<ActScript, CompileError> {
    let mut directives = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let directive = parse_line(text).map_err(|message| CompileError::Syntax {
            script: name.to_string(),
            line,
            message,
        })?;
        directives.push((line, directive));
    }
    Ok(ActScript {
        name: name.to_string(),
        directives,
    })
}

fn parse_line(text: &str) -> Result<Directive, String> {
    let mut words = text.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let directive = match keyword {
        "print" => Directive::Print(templates(&args)?),
        "wait" => {
            expect_args(keyword, &args, 1, 2)?;
            Directive::Wait {
                ms: number(args[0], "delay")?,
                tag: args.get(1).map(|t| number(t, "tag")).transpose()?,
            }
        }
        "connect" => {
            expect_args(keyword, &args, 2, 2)?;
            Directive::Connect {
                host: template(args[0])?,
                port: template(args[1])?,
            }
        }
        "write" => {
            if args.is_empty() {
                return Err("`write` needs something to write".to_string());
            }
            Directive::Write(templates(&args)?)
        }
        "read" => {
            expect_args(keyword, &args, 1, 2)?;
            let max: usize = number(args[0], "byte count")?;
            if max == 0 {
                return Err("`read` needs a positive byte count".to_string());
            }
            Directive::Read {
                max,
                tag: args.get(1).map(|t| number(t, "tag")).transpose()?,
            }
        }
        "close" => {
            expect_args(keyword, &args, 0, 0)?;
            Directive::Close
        }
        "spawn" => {
            expect_args(keyword, &args, 2, 2)?;
            Directive::Spawn {
                script: args[0].to_string(),
                tag: number(args[1], "tag")?,
            }
        }
        "cast" => {
            if args.len() < 2 {
                return Err("`cast` needs a tag and a pattern".to_string());
            }
            Directive::Cast {
                tag: number(args[0], "tag")?,
                pattern: template(args[1])?,
                data: templates(&args[2..])?,
            }
        }
        "receive" => {
            expect_args(keyword, &args, 0, 1)?;
            Directive::Receive(args.first().map(|p| p.to_string()))
        }
        "exit" => {
            expect_args(keyword, &args, 0, 0)?;
            Directive::Exit
        }
        other => return Err(format!("unknown directive `{}`", other)),
    };
    Ok(directive)
}

fn expect_args(keyword: &str, args: &[&str], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "`{}` takes {} argument(s), got {}",
            keyword,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("invalid {} `{}`", what, text))
}

fn template(word: &str) -> Result<Word, String> {
    match word.strip_prefix('$') {
        Some(name) if !name.is_empty() => VARIABLES
            .iter()
            .find(|known| **known == name)
            .map(|known| Word::Var(*known))
            .ok_or_else(|| format!("unknown variable `${}`", name)),
        _ => Ok(Word::Text(unescape(word))),
    }
}

fn templates(words: &[&str]) -> Result<Vec<Word>, String> {
    words.iter().map(|word| template(word)).collect()
}

/// Resolve `\n`, `\r`, `\t`, `\s` (space) and `\\`.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
