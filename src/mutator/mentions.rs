//! Guard against mass pings from relayed IRC text.

use crate::common::{PlatformType, Sender, Source};
use crate::mutator::Mutator;

const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Breaks `@everyone` and `@here` in text headed for Discord.
///
/// Webhooks are allowed to mention everyone, so an IRC user could otherwise
/// ping a whole guild through the bridge.
#[derive(Debug, Default)]
pub struct BlockMassMentions;

impl Mutator for BlockMassMentions {
    fn name(&self) -> &'static str {
        "block_mass_mentions"
    }

    fn mutate(&self, contents: &str, source: &Source, _sender: &Sender) -> Option<String> {
        if source.platform() != PlatformType::Irc {
            return Some(contents.to_string());
        }

        Some(
            contents
                .replace("@everyone", &format!("@{}everyone", ZERO_WIDTH_SPACE))
                .replace("@here", &format!("@{}here", ZERO_WIDTH_SPACE)),
        )
    }
}
