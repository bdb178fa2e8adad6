//! Slash commands understood by the interactive chat loop.

/// How a thread is named on the command line: its position in `/threads` (1-based) or its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Index(usize),
    Id(String),
}

impl ThreadRef {
    fn parse(arg: &str) -> Option<Self> {
        let arg = arg.trim();
        if arg.is_empty() {
            return None;
        }
        match arg.parse::<usize>() {
            Ok(n) if n > 0 => Some(ThreadRef::Index(n)),
            Ok(_) => None,
            Err(_) => Some(ThreadRef::Id(arg.to_string())),
        }
    }

    /// Resolve against the thread ids in listing order.
    pub fn resolve<'a>(&self, listed: &[&'a str]) -> Option<&'a str> {
        match self {
            ThreadRef::Index(n) => n.checked_sub(1).and_then(|i| listed.get(i)).copied(),
            ThreadRef::Id(id) => listed.iter().copied().find(|t| *t == id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Threads,
    Switch(ThreadRef),
    Delete(ThreadRef),
    /// `/model` alone shows the current model; with a name it switches.
    Model(Option<String>),
    Models,
    Help,
    Exit,
    /// Starts with `/` but is not a known command (or is missing its argument).
    Unknown(String),
}

pub const HELP: &str = "available commands:

/new            start a new thread
/threads        list threads (newest first)
/switch <n|id>  make a thread active
/delete <n|id>  delete a thread
/model [name]   show or change the active thread's model
/models         list available models
/help           show this help message
/exit, /quit    leave";

/// Parse a line as a slash command. Returns None for ordinary chat input.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (rest, ""),
    };
    let cmd = match name.to_ascii_lowercase().as_str() {
        "new" => Command::New,
        "threads" => Command::Threads,
        "switch" => match ThreadRef::parse(arg) {
            Some(r) => Command::Switch(r),
            None => Command::Unknown(line.to_string()),
        },
        "delete" => match ThreadRef::parse(arg) {
            Some(r) => Command::Delete(r),
            None => Command::Unknown(line.to_string()),
        },
        "model" => Command::Model(if arg.is_empty() {
            None
        } else {
            Some(arg.to_string())
        }),
        "models" => Command::Models,
        "help" => Command::Help,
        "exit" | "quit" => Command::Exit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(cmd)
}
