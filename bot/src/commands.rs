//! Command dispatch: maps parsed chat commands onto the game core and
//! turns every outcome into a typed reply the transport layer can
//! render. No user-facing text is produced here beyond stable error
//! codes and diagnostic messages.

use crate::BotContext;
use latte_mafia::{
    ChannelId, Game, GameId, IdentityLookup, MafiaError, Phase, StopOutcome, UserId,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `channel` is where the vote round will be held, usually the
    /// channel the command was issued in.
    Create { name: String, channel: ChannelId },
    Join { game: GameId, user: UserId },
    Leave { game: GameId, user: UserId },
    Start { game: GameId },
    Stop { game: GameId },
    Vote { game: GameId, voter: UserId, target: UserId },
    FinishVote { game: GameId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Created {
        game: GameId,
        name: String,
    },
    Joined {
        game: GameId,
        user: UserId,
        player_count: usize,
    },
    Left {
        game: GameId,
        user: UserId,
    },
    Started {
        game: GameId,
        /// Players whose vote prompt failed to deliver. The start
        /// itself still succeeded.
        undelivered: usize,
    },
    Stopped {
        game: GameId,
        outcome: StopOutcome,
    },
    VoteCounted {
        game: GameId,
        target: UserId,
        total: u32,
        undelivered: usize,
    },
    VoteClosed {
        game: GameId,
        leader: Option<UserId>,
        undelivered: usize,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Game(#[from] MafiaError),
    #[error("unknown user {0}")]
    UnknownIdentity(UserId),
    #[error("user {user} is already in game {game}")]
    AlreadyJoined { user: UserId, game: GameId },
    #[error("game {game} already has {max} players")]
    GameFull { game: GameId, max: u32 },
}

pub fn dispatch(
    ctx: &BotContext,
    identities: &dyn IdentityLookup,
    command: Command,
) -> Result<Reply, CommandError> {
    match command {
        Command::Create { name, channel } => {
            let session = ctx.registry().create_session(&name, channel);
            Ok(Reply::Created {
                game: session.id(),
                name: session.name().to_string(),
            })
        }
        Command::Join { game, user } => {
            if let Some(joined) = ctx.registry().find_player_session(user) {
                return Err(CommandError::AlreadyJoined { user, game: joined });
            }
            let identity = identities
                .lookup(user)
                .ok_or(CommandError::UnknownIdentity(user))?;
            let session = ctx.registry().find_waiting(game)?;
            let max = ctx.config().max_players;
            if session.player_count() >= max as usize {
                return Err(CommandError::GameFull { game, max });
            }
            let player = session.join_player(identity)?;
            let subscription = player.subscribe_vote_prompts(
                &ctx.bus(),
                ctx.registry(),
                ctx.transport(),
            );
            ctx.remember_subscription(game, user, subscription);
            Ok(Reply::Joined {
                game,
                user,
                player_count: session.player_count(),
            })
        }
        Command::Leave { game, user } => {
            let session = ctx.registry().find_session(game)?;
            let player = session.leave_player(user)?;
            if let Some(subscription) = ctx.take_subscription(game, user) {
                ctx.bus().unsubscribe(subscription);
            }
            Ok(Reply::Left {
                game,
                user: player.id(),
            })
        }
        Command::Start { game } => {
            let session = ctx.registry().find_waiting(game)?;
            let failures = session.start(&ctx.registry())?;
            Ok(Reply::Started {
                game,
                undelivered: failures.len(),
            })
        }
        Command::Stop { game } => {
            let session = ctx.registry().find_session(game)?;
            let outcome = session.stop(&ctx.registry())?;
            for player in session.players() {
                if let Some(subscription) = ctx.take_subscription(game, player.id()) {
                    ctx.bus().unsubscribe(subscription);
                }
            }
            Ok(Reply::Stopped { game, outcome })
        }
        Command::Vote { game, voter, target } => {
            let (total, failures) = ctx.registry().cast_vote(game, voter, target)?;
            Ok(Reply::VoteCounted {
                game,
                target,
                total,
                undelivered: failures.len(),
            })
        }
        Command::FinishVote { game } => {
            let session = ctx.registry().find_running(game)?;
            let outcome = session.finish_vote()?;
            Ok(Reply::VoteClosed {
                game,
                leader: outcome.leader(),
                undelivered: outcome.failures.len(),
            })
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub error: &'static str,
    pub message: String,
}

/// Stable, distinct code per error kind so the transport layer can
/// word each reply specifically.
pub fn error_code(err: &CommandError) -> &'static str {
    match err {
        CommandError::Game(MafiaError::SessionNotFound { phase: None, .. }) => "game_not_found",
        CommandError::Game(MafiaError::SessionNotFound {
            phase: Some(Phase::Waiting),
            ..
        }) => "game_not_started",
        CommandError::Game(MafiaError::SessionNotFound {
            phase: Some(Phase::Running),
            ..
        }) => "game_already_started",
        CommandError::Game(MafiaError::SessionNotFound {
            phase: Some(Phase::Stopped),
            ..
        }) => "game_finished",
        CommandError::Game(MafiaError::InvalidTransition { .. }) => "invalid_phase",
        CommandError::Game(MafiaError::PlayerNotFound { .. }) => "player_not_found",
        CommandError::UnknownIdentity(_) => "unknown_user",
        CommandError::AlreadyJoined { .. } => "already_joined",
        CommandError::GameFull { .. } => "game_full",
    }
}

pub fn error_reply(err: &CommandError) -> ErrorReply {
    ErrorReply {
        error: error_code(err),
        message: err.to_string(),
    }
}
