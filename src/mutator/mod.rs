//! Message mutators applied to text crossing the bridge.
//!
//! ## Module Structure
//!
//! - `formatting`: IRC control codes <-> Discord markdown
//! - `mentions`: mass-mention guard for text headed to Discord

pub mod formatting;
pub mod mentions;

use tracing::debug;

use crate::common::{Message, Sender, Source};

pub use formatting::TranslateFormatting;
pub use mentions::BlockMassMentions;

/// A pipeline stage transforming message text as it crosses the bridge.
///
/// Mutators only see the text and where it came from; they hold no state
/// shared between messages.
pub trait Mutator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return the new text, or `None` to drop the message.
    fn mutate(&self, contents: &str, source: &Source, sender: &Sender) -> Option<String>;
}

/// Ordered list of mutators.
pub struct MutatorPipeline {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorPipeline {
    /// Create an empty pipeline.
    pub fn empty() -> Self {
        Self {
            mutators: Vec::new(),
        }
    }

    /// The bridge's fixed pipeline: formatting first, then the mention guard.
    pub fn standard() -> Self {
        Self::empty()
            .with(TranslateFormatting)
            .with(BlockMassMentions)
    }

    /// Append a mutator to the end of the pipeline.
    pub fn with(mut self, mutator: impl Mutator + 'static) -> Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    /// Run every mutator in order, returning the transformed message.
    pub fn apply(&self, message: &Message) -> Option<Message> {
        let mut contents = message.contents.clone();

        for mutator in &self.mutators {
            match mutator.mutate(&contents, &message.source, &message.sender) {
                Some(next) => contents = next,
                None => {
                    debug!(mutator = mutator.name(), id = message.id, "Mutator dropped message");
                    return None;
                }
            }
        }

        Some(message.clone().with_contents(contents))
    }
}

impl Default for MutatorPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Channel, SourceIdentity};

    struct DropAll;

    impl Mutator for DropAll {
        fn name(&self) -> &'static str {
            "drop_all"
        }

        fn mutate(&self, _: &str, _: &Source, _: &Sender) -> Option<String> {
            None
        }
    }

    struct Shout;

    impl Mutator for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn mutate(&self, contents: &str, _: &Source, _: &Sender) -> Option<String> {
            Some(contents.to_uppercase())
        }
    }

    fn irc_message(contents: &str) -> Message {
        Message::new(
            contents,
            Sender::irc("bob", None),
            Source {
                channel: Channel::irc("#rust"),
                identity: SourceIdentity::Nick("bob".to_string()),
            },
        )
    }

    #[test]
    fn test_standard_pipeline_translates() {
        let message = irc_message("\x02hi @everyone");
        let out = MutatorPipeline::standard().apply(&message).unwrap();

        assert_eq!(out.contents, "**hi @\u{200B}everyone**");
        assert_eq!(out.id, message.id);
        // Input is left as it was
        assert_eq!(message.contents, "\x02hi @everyone");
    }

    #[test]
    fn test_mutators_run_in_order() {
        let pipeline = MutatorPipeline::empty()
            .with(Shout)
            .with(TranslateFormatting);
        let out = pipeline.apply(&irc_message("\x1Dquiet")).unwrap();
        assert_eq!(out.contents, "*QUIET*");
    }

    #[test]
    fn test_drop_stops_pipeline() {
        let pipeline = MutatorPipeline::empty().with(DropAll).with(Shout);
        assert!(pipeline.apply(&irc_message("x")).is_none());
    }
}
