//! The seam between console actions and whatever presents them to the user.
//!
//! Actions never prompt or alert directly. They describe what they need
//! confirmed with a [`ConfirmPrompt`] and report outcomes with a
//! [`Notification`]; a CLI, a GUI, or a test double decides how to show them.

// Futures from these traits are only ever awaited on the current thread.
#![allow(async_fn_in_trait)]

use std::fmt;

/// A yes/no question put to the user before a destructive action.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfirmPrompt {
    /// The channel being closed isn't usable yet, which usually means its
    /// funding transaction is still confirming.
    InactiveChannel,
    /// Final confirmation before closing a channel.
    CloseChannel {
        /// The peer's alias, or "Unknown Node" if it couldn't be resolved.
        alias: String,
        node_id: String,
        channel_id: String,
    },
}

impl fmt::Display for ConfirmPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InactiveChannel => write!(
                f,
                "This channel is inactive. Some channels require up to 6 \
                 onchain confirmations before they are usable. If you really \
                 want to continue, click OK."
            ),
            Self::CloseChannel {
                alias,
                node_id,
                channel_id,
            } => write!(
                f,
                "Are you sure you want to close the channel with {alias}?\n\n\
                 Node ID: {node_id}\n\nChannel ID: {channel_id}"
            ),
        }
    }
}

/// The outcome of an action, as shown to the user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    Success(String),
    Error(String),
}

impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self::Success(msg.into())
    }

    /// An error notification prefixed with what the user was trying to do,
    /// e.g. "Something went wrong: Hub internal error: peer offline".
    pub fn error(context: &str, error: impl fmt::Display) -> Self {
        Self::Error(format!("{context}: {error}"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success(msg) | Self::Error(msg) => msg,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Asks the user to confirm a [`ConfirmPrompt`].
pub trait Confirm {
    /// Resolves to `true` only if the user explicitly agreed.
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Shows a [`Notification`] to the user.
pub trait Notify {
    fn notify(&self, notification: Notification);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prompt_text() {
        let prompt = ConfirmPrompt::CloseChannel {
            alias: "ACINQ".to_owned(),
            node_id: "03864e".to_owned(),
            channel_id: "chan1".to_owned(),
        };
        assert_eq!(
            prompt.to_string(),
            "Are you sure you want to close the channel with ACINQ?\n\n\
             Node ID: 03864e\n\nChannel ID: chan1"
        );
        assert!(
            ConfirmPrompt::InactiveChannel
                .to_string()
                .contains("up to 6 onchain confirmations")
        );
    }

    #[test]
    fn notifications() {
        let ok = Notification::success("Channel closed");
        assert!(!ok.is_error());
        assert_eq!(ok.to_string(), "Channel closed");

        let err = Notification::error("Something went wrong", "boom");
        assert!(err.is_error());
        assert_eq!(err.message(), "Something went wrong: boom");
    }
}
