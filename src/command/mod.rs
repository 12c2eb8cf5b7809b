//! In-chat commands.
//!
//! A command is a message whose first whitespace-separated token is the
//! command prefix followed by a registered name, e.g. `!system`. Executors get
//! the whole message and parse their own arguments.

pub mod system_info;

use std::collections::HashMap;

use tracing::debug;

use crate::common::{Destination, Message, Sender};

pub use system_info::SystemInfo;

/// Handles one named command.
pub trait Executor: Send + Sync {
    /// Produce a reply, or `None` to stay silent (unauthorized callers included).
    fn on_command(&self, command: &Message) -> Option<String>;
}

/// Looks up and delegates to command executors.
pub struct CommandManager {
    prefix: char,
    executors: HashMap<String, Box<dyn Executor>>,
}

impl CommandManager {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            executors: HashMap::new(),
        }
    }

    /// Register an executor under the given command name.
    pub fn register(&mut self, name: impl Into<String>, executor: impl Executor + 'static) {
        self.executors.insert(name.into(), Box::new(executor));
    }

    /// Name of the command this message invokes, if it looks like one.
    fn trigger<'a>(&self, contents: &'a str) -> Option<&'a str> {
        contents
            .split_whitespace()
            .next()?
            .strip_prefix(self.prefix)
    }

    /// Run the command in `message`, if any, and return the bridge's reply.
    ///
    /// Replies are addressed to both networks and sent as `bot`. Messages the
    /// bridge wrote itself are never treated as commands, so a reply starting
    /// with the prefix cannot trigger another command.
    pub fn process_command(&self, message: &Message, bot: &Sender) -> Option<Message> {
        if message.originates_from_bridge() {
            return None;
        }

        let trigger = self.trigger(&message.contents)?;
        let executor = self.executors.get(trigger)?;

        debug!(command = trigger, sender = %message.sender.display_name, "Passing command to executor");

        let command = message.clone().with_destination(Destination::Both);
        let result = executor.on_command(&command)?;

        Some(command.reply(result, bot))
    }
}
