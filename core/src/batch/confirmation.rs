use std::{
    fmt,
    io::{self, BufRead, StdinLock, Stdout, Write},
    str::FromStr,
};

use crate::config::ConfigurationError;

pub const INVALID_ANSWER_MESSAGE: &str = "Please respond with 'yes' or 'no' (or 'y' or 'n').";

#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// What an empty answer (just pressing Enter) means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmDefault {
    #[default]
    Yes,
    No,
    /// An explicit answer is required.
    None,
}

impl ConfirmDefault {
    fn hint(&self) -> &'static str {
        match self {
            ConfirmDefault::Yes => " [Y/n] ",
            ConfirmDefault::No => " [y/N] ",
            ConfirmDefault::None => " [y/n] ",
        }
    }

    fn answer(&self) -> Option<bool> {
        match self {
            ConfirmDefault::Yes => Some(true),
            ConfirmDefault::No => Some(false),
            ConfirmDefault::None => None,
        }
    }
}

impl FromStr for ConfirmDefault {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(ConfirmDefault::Yes),
            "no" => Ok(ConfirmDefault::No),
            "none" => Ok(ConfirmDefault::None),
            _ => Err(ConfigurationError::InvalidConfirmDefault(s.to_string())),
        }
    }
}

impl fmt::Display for ConfirmDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmDefault::Yes => write!(f, "yes"),
            ConfirmDefault::No => write!(f, "no"),
            ConfirmDefault::None => write!(f, "none"),
        }
    }
}

/// Maps a normalised answer to yes/no, `None` when it is neither.
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer {
        "yes" | "y" | "ye" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

pub trait Prompt {
    fn ask_yes_no(&mut self, question: &str, default: ConfirmDefault) -> Result<bool, PromptError>;
}

/// Line-oriented yes/no prompt. Re-asks until it gets a usable answer; EOF counts as "no".
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalPrompt<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn ask_yes_no(&mut self, question: &str, default: ConfirmDefault) -> Result<bool, PromptError> {
        loop {
            write!(self.output, "{}{}", question, default.hint())?;
            self.output.flush()?;

            let mut input = String::new();
            if self.input.read_line(&mut input)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            let choice = input.trim().to_lowercase();

            if choice.is_empty() {
                if let Some(answer) = default.answer() {
                    return Ok(answer);
                }
            } else if let Some(answer) = parse_answer(&choice) {
                return Ok(answer);
            }

            writeln!(self.output, "{}", INVALID_ANSWER_MESSAGE)?;
        }
    }
}

/// Run-scoped approval for destructive writes. Asks at most until the first "yes",
/// then stays approved for the rest of the run.
pub struct ConfirmationGate<'a> {
    approved: bool,
    default: ConfirmDefault,
    prompt: &'a mut dyn Prompt,
}

impl<'a> ConfirmationGate<'a> {
    pub fn new(no_confirm: bool, default: ConfirmDefault, prompt: &'a mut dyn Prompt) -> Self {
        Self { approved: no_confirm, default, prompt }
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        if !self.approved && self.prompt.ask_yes_no(question, self.default)? {
            self.approved = true;
        }
        Ok(self.approved)
    }
}
